//! Built-in fitness knowledge base with cited sources.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KnowledgeEntry {
    pub id: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub keywords: &'static [&'static str],
    pub source: &'static str,
}

pub const MAX_RESULTS: usize = 3;

const ENTRIES: &[KnowledgeEntry] = &[
    KnowledgeEntry {
        id: "protein-intake",
        category: "nutrition",
        title: "Daily protein intake for muscle gain",
        summary: "Intakes of roughly 1.6 g of protein per kg of body weight per day maximise \
                  resistance-training gains; benefits beyond about 2.2 g/kg are small.",
        keywords: &["protein", "muscle", "intake", "grams", "hypertrophy", "gain"],
        source: "Morton et al., British Journal of Sports Medicine, 2018",
    },
    KnowledgeEntry {
        id: "protein-distribution",
        category: "nutrition",
        title: "Spreading protein across meals",
        summary: "Around 0.4 g/kg of protein per meal across at least four meals supports \
                  muscle protein synthesis better than one or two large servings.",
        keywords: &["protein", "meal", "timing", "distribution", "breakfast", "synthesis"],
        source: "Schoenfeld & Aragon, JISSN, 2018",
    },
    KnowledgeEntry {
        id: "deficit-rate",
        category: "weight",
        title: "Safe rate of weight loss",
        summary: "Losing about 0.5 to 1.0 percent of body weight per week helps preserve lean \
                  mass during a calorie deficit.",
        keywords: &["deficit", "weight", "loss", "cut", "fat", "rate", "calorie"],
        source: "Helms et al., JISSN, 2014",
    },
    KnowledgeEntry {
        id: "sleep-recovery",
        category: "recovery",
        title: "Sleep and body composition",
        summary: "Restricting sleep to 5.5 hours during a diet shifted weight loss away from \
                  fat and toward lean mass compared with 8.5 hours.",
        keywords: &["sleep", "recovery", "fat", "loss", "rest", "tired"],
        source: "Nedeltcheva et al., Annals of Internal Medicine, 2010",
    },
    KnowledgeEntry {
        id: "training-volume",
        category: "training",
        title: "Weekly training volume",
        summary: "At least 10 hard sets per muscle group per week produce more hypertrophy \
                  than lower volumes for most trainees.",
        keywords: &["sets", "volume", "training", "hypertrophy", "muscle", "workout", "lift"],
        source: "Schoenfeld et al., Journal of Sports Sciences, 2017",
    },
    KnowledgeEntry {
        id: "steps-mortality",
        category: "activity",
        title: "Daily steps and health",
        summary: "Mortality risk falls progressively with more daily steps, levelling off \
                  between 6,000 and 10,000 steps for most adults.",
        keywords: &["steps", "walking", "activity", "cardio", "neat", "health"],
        source: "Paluch et al., The Lancet Public Health, 2022",
    },
    KnowledgeEntry {
        id: "creatine",
        category: "supplements",
        title: "Creatine monohydrate",
        summary: "3 to 5 g of creatine monohydrate per day is safe and improves strength and \
                  lean mass gains when combined with resistance training.",
        keywords: &["creatine", "supplement", "strength", "monohydrate", "power"],
        source: "Kreider et al., JISSN position stand, 2017",
    },
    KnowledgeEntry {
        id: "caffeine",
        category: "supplements",
        title: "Caffeine for performance",
        summary: "3 to 6 mg/kg of caffeine taken about 60 minutes before exercise improves \
                  endurance and strength performance.",
        keywords: &["caffeine", "coffee", "performance", "pre-workout", "endurance", "supplement"],
        source: "Guest et al., JISSN position stand, 2021",
    },
    KnowledgeEntry {
        id: "hydration",
        category: "nutrition",
        title: "Hydration during exercise",
        summary: "Fluid losses above 2 percent of body weight impair endurance performance; \
                  drink to limit losses during long sessions.",
        keywords: &["water", "hydration", "fluid", "sweat", "endurance", "drink"],
        source: "ACSM position stand, Medicine & Science in Sports & Exercise, 2007",
    },
    KnowledgeEntry {
        id: "fiber",
        category: "nutrition",
        title: "Dietary fibre",
        summary: "Eating 25 to 29 g of fibre per day is associated with lower all-cause \
                  mortality and cardiovascular risk.",
        keywords: &["fiber", "fibre", "carbs", "vegetables", "satiety", "gut"],
        source: "Reynolds et al., The Lancet, 2019",
    },
];

fn score(entry: &KnowledgeEntry, terms: &[String]) -> u32 {
    let title = entry.title.to_lowercase();
    terms
        .iter()
        .map(|term| {
            let mut points = 0;
            if entry.keywords.iter().any(|k| k.contains(term.as_str())) {
                points += 2;
            }
            if title.contains(term.as_str()) {
                points += 1;
            }
            points
        })
        .sum()
}

/// Best-scoring entries for `query`, optionally restricted to `category`
pub fn search(query: &str, category: Option<&str>) -> Vec<&'static KnowledgeEntry> {
    let terms: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect();

    let mut scored: Vec<(u32, &'static KnowledgeEntry)> = ENTRIES
        .iter()
        .filter(|e| category.is_none_or(|c| e.category.eq_ignore_ascii_case(c)))
        .map(|e| (score(e, &terms), e))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(MAX_RESULTS).map(|(_, e)| e).collect()
}
