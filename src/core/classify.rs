//! Keyword-based evidence classification.
//!
//! Scores a document against the criteria of its visa category using the file
//! name and whatever text could be pulled from the first pages.

use crate::domain::model::{Classification, VisaType};

struct Criterion {
    code: &'static str,
    name: &'static str,
    keywords: &'static [&'static str],
}

const O1A_CRITERIA: &[Criterion] = &[
    Criterion { code: "O1A-1", name: "Awards & Prizes", keywords: &["award", "prize", "winner", "recipient", "honor", "medal", "trophy"] },
    Criterion { code: "O1A-2", name: "Membership", keywords: &["member", "association", "organization", "society", "fellow", "elected"] },
    Criterion { code: "O1A-3", name: "Published Material", keywords: &["article", "interview", "media", "publication", "press", "news", "featured"] },
    Criterion { code: "O1A-4", name: "Judging", keywords: &["judge", "panel", "evaluate", "referee", "review", "jury", "selection"] },
    Criterion { code: "O1A-5", name: "Original Contributions", keywords: &["patent", "invention", "innovation", "contribution", "original", "discovery"] },
    Criterion { code: "O1A-6", name: "Scholarly Articles", keywords: &["journal", "publication", "research", "paper", "academic", "peer-reviewed"] },
    Criterion { code: "O1A-7", name: "Critical Role", keywords: &["employment", "position", "role", "organization", "lead", "director", "executive"] },
    Criterion { code: "O1A-8", name: "High Salary", keywords: &["salary", "compensation", "pay", "contract", "remuneration", "earnings"] },
];

const O1B_CRITERIA: &[Criterion] = &[
    Criterion { code: "O1B-1", name: "Lead/Starring Role", keywords: &["lead", "star", "principal", "featured", "headliner"] },
    Criterion { code: "O1B-2", name: "Critical Reviews", keywords: &["review", "critic", "acclaim", "praised", "recognized"] },
    Criterion { code: "O1B-3", name: "Major Commercial Success", keywords: &["box office", "sales", "revenue", "commercial", "success"] },
    Criterion { code: "O1B-4", name: "High Salary", keywords: &["salary", "compensation", "pay", "contract", "fee"] },
    Criterion { code: "O1B-5", name: "Recognition", keywords: &["award", "nomination", "honor", "recognition"] },
    Criterion { code: "O1B-6", name: "Distinguished Reputation", keywords: &["distinguished", "renowned", "prominent", "reputation"] },
];

const P1A_CRITERIA: &[Criterion] = &[
    Criterion { code: "P1A-1", name: "Major U.S. League", keywords: &["league", "team", "contract", "roster", "professional"] },
    Criterion { code: "P1A-2", name: "National Team", keywords: &["national", "team", "international", "competition", "country"] },
    Criterion { code: "P1A-3", name: "Intercollegiate", keywords: &["college", "ncaa", "university", "intercollegiate", "collegiate"] },
    Criterion { code: "P1A-4", name: "Federation Statement", keywords: &["federation", "governing", "official", "statement", "sanctioning"] },
    Criterion { code: "P1A-5", name: "Expert Statement", keywords: &["expert", "letter", "recommendation", "statement", "opinion"] },
    Criterion { code: "P1A-6", name: "International Ranking", keywords: &["ranking", "ranked", "position", "standings", "world"] },
    Criterion { code: "P1A-7", name: "Honors & Awards", keywords: &["award", "honor", "champion", "medal", "title", "trophy"] },
];

const EB1A_CRITERIA: &[Criterion] = &[
    Criterion { code: "EB1A-1", name: "Major Awards", keywords: &["award", "prize", "internationally", "nationally", "recognized"] },
    Criterion { code: "EB1A-2", name: "Membership", keywords: &["member", "association", "outstanding", "achievements"] },
    Criterion { code: "EB1A-3", name: "Published Material", keywords: &["article", "published", "media", "about", "work"] },
    Criterion { code: "EB1A-4", name: "Judging", keywords: &["judge", "evaluate", "panel", "review"] },
    Criterion { code: "EB1A-5", name: "Original Contributions", keywords: &["contribution", "major", "significance", "field"] },
    Criterion { code: "EB1A-6", name: "Scholarly Articles", keywords: &["scholarly", "articles", "professional", "publications"] },
    Criterion { code: "EB1A-7", name: "Artistic Exhibitions", keywords: &["exhibition", "display", "showcase", "artistic"] },
    Criterion { code: "EB1A-8", name: "Leading/Critical Role", keywords: &["leading", "critical", "role", "organization"] },
    Criterion { code: "EB1A-9", name: "High Salary", keywords: &["high", "salary", "remuneration", "compensation"] },
    Criterion { code: "EB1A-10", name: "Commercial Success", keywords: &["commercial", "success", "sales", "box office"] },
];

// 順序決定同分時的優先權
const DOCUMENT_TYPES: &[(&str, &[&str])] = &[
    ("award_certificate", &["certificate", "award", "diploma", "recognition", "trophy"]),
    ("media_article", &["article", "news", "interview", "press", "publication", "magazine"]),
    ("expert_letter", &["letter", "recommendation", "attestation", "statement", "opinion"]),
    ("ranking_evidence", &["ranking", "standings", "position", "leaderboard", "list"]),
    ("contract", &["contract", "agreement", "employment", "compensation", "offer"]),
    ("passport", &["passport", "travel", "visa", "immigration", "i-94"]),
    ("form", &["form", "i-129", "i-907", "g-1450", "uscis", "petition"]),
    ("competition_result", &["result", "match", "bout", "competition", "tournament", "score"]),
    ("membership", &["membership", "member", "certificate", "enrollment", "card"]),
    ("salary_evidence", &["salary", "pay", "stub", "w-2", "tax", "compensation"]),
    ("credential", &["degree", "diploma", "certificate", "license", "credential"]),
    ("brief", &["brief", "petition", "letter", "support", "cover"]),
];

const RULE_CONFIDENCE_CAP: f64 = 0.8;

fn criteria_for(visa_type: VisaType) -> &'static [Criterion] {
    match visa_type {
        VisaType::O1B => O1B_CRITERIA,
        VisaType::P1A => P1A_CRITERIA,
        VisaType::EB1A => EB1A_CRITERIA,
        _ => O1A_CRITERIA,
    }
}

pub fn detect_document_type(haystack: &str) -> &'static str {
    DOCUMENT_TYPES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| haystack.contains(kw)))
        .map(|(name, _)| *name)
        .unwrap_or("other")
}

/// 以關鍵字規則分類文件
pub fn classify_document(file_name: &str, text: Option<&str>, visa_type: VisaType) -> Classification {
    let haystack = format!("{} {}", text.unwrap_or(""), file_name).to_lowercase();
    let criteria = criteria_for(visa_type);

    let mut best = &criteria[0];
    let mut best_score = 0usize;
    for criterion in criteria {
        let score = criterion
            .keywords
            .iter()
            .filter(|kw| haystack.contains(*kw))
            .count();
        if score > best_score {
            best = criterion;
            best_score = score;
        }
    }

    let max_possible = best.keywords.len().max(1);
    let confidence = (best_score as f64 / max_possible as f64).min(1.0) * RULE_CONFIDENCE_CAP;

    let sample: Vec<&str> = best.keywords.iter().take(3).copied().collect();

    Classification {
        criterion_code: best.code.to_string(),
        criterion_name: best.name.to_string(),
        document_type: detect_document_type(&haystack).to_string(),
        confidence,
        reasoning: format!("Rule-based match on keywords: {}", sample.join(", ")),
        evidence_type: (visa_type != VisaType::P1A).then(|| "standard".to_string()),
        method: "rules".to_string(),
    }
}

/// 由檔名與分類結果產生展品標題
pub fn suggested_title(file_name: &str, classification: Option<&Classification>) -> String {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .replace(['_', '-'], " ");
    let stem = stem.split_whitespace().collect::<Vec<_>>().join(" ");

    match classification {
        Some(c) if c.document_type != "other" => {
            let kind = c
                .document_type
                .split('_')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" ");
            let title = format!("{} - {}", kind, stem);
            title.chars().take(120).collect()
        }
        _ => stem,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_award_certificate_for_o1a() {
        let result = classify_document(
            "gold_medal_award.pdf",
            Some("This certificate honors the winner of the annual prize"),
            VisaType::O1A,
        );
        assert_eq!(result.criterion_code, "O1A-1");
        assert_eq!(result.criterion_name, "Awards & Prizes");
        assert_eq!(result.document_type, "award_certificate");
        assert!(result.confidence > 0.0 && result.confidence <= 0.8);
        assert_eq!(result.evidence_type.as_deref(), Some("standard"));
        assert_eq!(result.method, "rules");
    }

    #[test]
    fn test_no_keywords_falls_back_to_first_criterion() {
        let result = classify_document("scan_0001.pdf", None, VisaType::EB1A);
        assert_eq!(result.criterion_code, "EB1A-1");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.document_type, "other");
    }

    #[test]
    fn test_p1a_has_no_evidence_type() {
        let result = classify_document("national_team_competition.pdf", None, VisaType::P1A);
        assert!(result.evidence_type.is_none());
        assert_eq!(result.criterion_code, "P1A-2");
    }

    #[test]
    fn test_unlisted_visa_uses_o1a_table() {
        let result = classify_document("salary_contract.pdf", None, VisaType::EB2Niw);
        assert!(result.criterion_code.starts_with("O1A-"));
        assert_eq!(result.criterion_code, "O1A-8");
    }

    #[test]
    fn test_suggested_title() {
        let classification = classify_document("press_interview.pdf", None, VisaType::O1A);
        assert_eq!(
            suggested_title("press_interview.pdf", Some(&classification)),
            "Media Article - press interview"
        );
        assert_eq!(suggested_title("scan-0001.pdf", None), "scan 0001");
    }
}
