//! Tier 1 of the cascade: a fixed keyword rule. Cheap, always available, and
//! the only tier allowed to issue the hard `barred` veto.

/// Terms signalling that the sender is offering work.
pub(crate) const EMPLOYER_TERMS: &[&str] = &[
    "we are",
    "we're hiring",
    "we are looking for",
    "need a",
    "job opening",
    "join our team",
    "now hiring",
    "open position",
    "apply now",
    "work with us",
    "seeking",
    "vacancy",
    "opportunity",
    "positions available",
    "recruiting",
    "join us",
    "immediate hire",
    "urgently hiring",
    "hiring now",
    "currently need someone",
    "we need someone",
    "must have",
    "requirements",
    "responsibilities",
    "what we offer",
    "compensation",
    "salary",
    "commission",
    "shift available",
    "to apply",
    "fill out this form",
    "dm to apply",
    "send resume",
    "submit application",
    "work opportunity",
    "required",
];

/// Terms signalling that the sender is advertising their own services.
pub(crate) const FREELANCER_TERMS: &[&str] = &[
    "available",
    "freelancer",
    "hire me",
    "looking for work",
    "ready to work",
    "seeking job",
    "open to opportunities",
    "i can work",
    "i'm experienced in",
    "my skills",
    "i offer",
    "services",
    "portfolio",
    "proof of work",
    "i specialize in",
    "i have experience",
    "willing to learn",
    "can start immediately",
    "flexible schedule",
    "full-time",
    "part-time",
    "remote work",
    "open for collaboration",
    "let's connect",
    "let's discuss",
    "i'm interested",
    "need a job",
    "job seeker",
    "available for hire",
    "i'm searching for",
    "let me help",
    "i'm a",
    "i'm from",
    "my rate is",
    "interested in hiring",
    "i'm an expert",
    "i'm experienced",
];

/// Terms that disqualify a message outright regardless of the other counts.
pub(crate) const BARRED_TERMS: &[&str] = &[
    "sent a dm",
    "hack",
    "unban",
    "unbans",
    "can't send message",
    "can't dm",
    "automates",
    "automate",
    "buying",
    "hackers",
    "limited spot",
    "limited spots",
    "needs traffic",
    "banned",
    "removal",
    "limited space",
    "spanish",
    "french",
    "danish",
    "swap",
    "recovery",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordLabel {
    Employer,
    Freelancer,
    Barred,
    /// Inconclusive: hand the text to the next tier.
    Unsure,
}

/// Applies the keyword rule to one message.
///
/// Matching is case-insensitive substring containment; counts are distinct
/// terms, not occurrences. A label is only assigned when at least two terms
/// match and the count strictly beats the opposing set.
pub fn label_by_keywords(text: &str) -> KeywordLabel {
    // Mobile keyboards type U+2019; the term lists use the ASCII apostrophe.
    let text = text.to_lowercase().replace('\u{2019}', "'");

    if BARRED_TERMS.iter().any(|term| text.contains(term)) {
        return KeywordLabel::Barred;
    }

    let employer = EMPLOYER_TERMS
        .iter()
        .filter(|term| text.contains(*term))
        .count();
    let freelancer = FREELANCER_TERMS
        .iter()
        .filter(|term| text.contains(*term))
        .count();

    if employer >= 2 && employer > freelancer {
        KeywordLabel::Employer
    } else if freelancer >= 2 && freelancer > employer {
        KeywordLabel::Freelancer
    } else {
        KeywordLabel::Unsure
    }
}
