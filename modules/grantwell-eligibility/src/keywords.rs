//! Industry taxonomy used by the INDUSTRY_RELEVANCE filter.
//!
//! Three matching tiers per industry tag: category codes, category names,
//! then free-text keywords. Exclusion keywords mark grants that explicitly
//! serve a different population (e.g. "urban" grants for an agriculture tag).

/// One industry's lexicon entry.
pub struct IndustryLexicon {
    pub tag: &'static str,
    /// CFDA-style category codes this industry maps to.
    pub category_codes: &'static [&'static str],
    /// Category names that count as a direct match.
    pub category_names: &'static [&'static str],
    /// Free-text keywords; two hits are a strong signal, one is weak.
    pub keywords: &'static [&'static str],
    /// A hit here without any accompanying keyword hit fails the tag.
    pub exclusions: &'static [&'static str],
}

/// Look up the lexicon entry for a normalized industry tag.
pub fn lexicon_for(tag: &str) -> Option<&'static IndustryLexicon> {
    LEXICON.iter().find(|l| l.tag == tag)
}

pub static LEXICON: &[IndustryLexicon] = &[
    IndustryLexicon {
        tag: "agriculture",
        category_codes: &["10", "AG"],
        category_names: &["agriculture", "farming", "rural development", "food systems"],
        keywords: &[
            "farm", "farmer", "crop", "livestock", "ranch", "agricultural", "rural", "soil",
            "harvest", "dairy", "orchard",
        ],
        exclusions: &["urban transit", "metropolitan"],
    },
    IndustryLexicon {
        tag: "technology",
        category_codes: &["47", "TC"],
        category_names: &["technology", "science and technology", "innovation", "research"],
        keywords: &[
            "software", "technology", "startup", "innovation", "digital", "broadband", "stem",
            "computing", "data",
        ],
        exclusions: &["no technology costs"],
    },
    IndustryLexicon {
        tag: "healthcare",
        category_codes: &["93", "HL"],
        category_names: &["health", "healthcare", "public health", "mental health"],
        keywords: &[
            "health", "clinic", "medical", "patient", "hospital", "wellness", "telehealth",
            "nursing",
        ],
        exclusions: &["veterinary only"],
    },
    IndustryLexicon {
        tag: "education",
        category_codes: &["84", "ED"],
        category_names: &["education", "training", "workforce development", "youth"],
        keywords: &[
            "education", "school", "student", "teacher", "curriculum", "literacy", "training",
            "classroom", "tutoring",
        ],
        exclusions: &["higher education only"],
    },
    IndustryLexicon {
        tag: "arts",
        category_codes: &["45", "AR"],
        category_names: &["arts", "humanities", "culture", "creative economy"],
        keywords: &[
            "arts", "artist", "museum", "theater", "music", "cultural", "creative", "gallery",
            "performance",
        ],
        exclusions: &[],
    },
    IndustryLexicon {
        tag: "environment",
        category_codes: &["66", "EN"],
        category_names: &["environment", "energy", "conservation", "climate"],
        keywords: &[
            "environment", "climate", "conservation", "renewable", "solar", "watershed",
            "sustainability", "emissions", "habitat",
        ],
        exclusions: &["fossil fuel expansion"],
    },
    IndustryLexicon {
        tag: "housing",
        category_codes: &["14", "HO"],
        category_names: &["housing", "community development", "homelessness"],
        keywords: &[
            "housing", "affordable", "tenant", "homeless", "shelter", "rental", "homeowner",
            "eviction",
        ],
        exclusions: &[],
    },
    IndustryLexicon {
        tag: "manufacturing",
        category_codes: &["11", "MF"],
        category_names: &["manufacturing", "industrial", "supply chain"],
        keywords: &[
            "manufacturing", "factory", "production", "industrial", "fabrication", "machining",
            "assembly",
        ],
        exclusions: &["service businesses only"],
    },
];
