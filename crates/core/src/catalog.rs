//! Built-in exam catalog: subjects, their draw weights, tutor routing and
//! the detailed syllabus used to refine a subject into a sub-topic.

use std::collections::BTreeMap;

use crate::model::{Tutor, base_subject};
use crate::sampler::SubjectWeights;

pub const LOGIC: &str = "Logic";
pub const VERBAL_REASONING: &str = "Critical verbal reasoning";
pub const SITUATIONAL: &str = "Situational questions";
pub const ICT: &str = "Information technology (ICT)";
pub const ENGLISH: &str = "English A2";
pub const DIGITAL_ADMINISTRATION: &str = "Digital Administration Code (CAD)";
pub const WORKPLACE_SAFETY: &str = "Workplace safety (Leg. Decree 81/2008)";
pub const ADMINISTRATIVE_LAW: &str = "Administrative law";
pub const PUBLIC_CONTRACTS: &str = "Public contracts";
pub const CRIMINAL_LAW: &str = "Criminal law (public administration)";
pub const PUBLIC_EMPLOYMENT: &str = "Public employment";
pub const CIVIL_SERVANT_LIABILITY: &str = "Civil servant liability";
pub const CULTURAL_HERITAGE: &str = "Cultural heritage";
pub const MINISTRY_STRUCTURE: &str = "Ministry of Culture structure";
pub const EU_LAW: &str = "European Union law";
pub const PUBLIC_COMMUNICATION: &str = "Public sector marketing and communication";
pub const STATE_ACCOUNTING: &str = "State accounting";

/// `(subject, weight, tutor)`; weights are relative, not quotas.
const SUBJECTS: [(&str, f64, Tutor); 16] = [
    (LOGIC, 7.0, Tutor::Stella),
    (SITUATIONAL, 8.0, Tutor::Stella),
    (ICT, 2.0, Tutor::Stella),
    (ENGLISH, 2.0, Tutor::Stella),
    (DIGITAL_ADMINISTRATION, 2.0, Tutor::Stella),
    (ADMINISTRATIVE_LAW, 6.0, Tutor::Maria),
    (PUBLIC_CONTRACTS, 3.0, Tutor::Maria),
    (WORKPLACE_SAFETY, 4.0, Tutor::Maria),
    (CRIMINAL_LAW, 3.0, Tutor::Maria),
    (PUBLIC_EMPLOYMENT, 3.0, Tutor::Maria),
    (CIVIL_SERVANT_LIABILITY, 2.0, Tutor::Maria),
    (CULTURAL_HERITAGE, 4.0, Tutor::Luna),
    (MINISTRY_STRUCTURE, 2.0, Tutor::Luna),
    (EU_LAW, 2.0, Tutor::Luna),
    (PUBLIC_COMMUNICATION, 2.0, Tutor::Luna),
    (STATE_ACCOUNTING, 2.0, Tutor::Luna),
];

/// Subjects that make up the knowledge block of a mock exam.
pub const KNOWLEDGE_POOL: [&str; 10] = [
    ADMINISTRATIVE_LAW,
    CRIMINAL_LAW,
    DIGITAL_ADMINISTRATION,
    EU_LAW,
    STATE_ACCOUNTING,
    WORKPLACE_SAFETY,
    PUBLIC_COMMUNICATION,
    CULTURAL_HERITAGE,
    MINISTRY_STRUCTURE,
    PUBLIC_EMPLOYMENT,
];

/// Subjects that make up the reasoning block of a mock exam.
pub const REASONING_POOL: [&str; 2] = [LOGIC, VERBAL_REASONING];

/// Default draw weights for the free-play sampler.
#[must_use]
pub fn default_weights() -> SubjectWeights {
    SubjectWeights::from_trusted(SUBJECTS.iter().map(|(name, w, _)| ((*name).to_string(), *w)))
}

/// Tutor that hosts a subject; unknown subjects go to the fallback tutor.
#[must_use]
pub fn tutor_for_subject(label: &str) -> Tutor {
    let base = base_subject(label);
    SUBJECTS
        .iter()
        .find(|(name, _, _)| *name == base)
        .map_or_else(Tutor::fallback, |(_, _, tutor)| *tutor)
}

/// True for the subject whose questions use efficacy scoring.
#[must_use]
pub fn is_situational(label: &str) -> bool {
    base_subject(label) == SITUATIONAL
}

//
// ─── SYLLABUS ──────────────────────────────────────────────────────────────────
//

/// Sub-topics per coarse subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Syllabus {
    topics: BTreeMap<String, Vec<String>>,
}

impl Syllabus {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add sub-topics for a subject; blank entries are skipped.
    #[must_use]
    pub fn with_topics<I, S>(mut self, subject: &str, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .topics
            .entry(base_subject(subject).to_string())
            .or_default();
        for topic in topics {
            let topic: String = topic.into();
            let topic = topic.trim();
            if !topic.is_empty() {
                entry.push(topic.to_string());
            }
        }
        self
    }

    /// Sub-topics of a subject; empty for subjects without a detailed syllabus.
    #[must_use]
    pub fn topics_for(&self, subject: &str) -> &[String] {
        self.topics
            .get(base_subject(subject))
            .map_or(&[], Vec::as_slice)
    }
}

/// Detailed syllabus for the built-in catalog.
#[must_use]
pub fn syllabus() -> Syllabus {
    Syllabus::empty()
        .with_topics(
            ADMINISTRATIVE_LAW,
            [
                "Law 241/1990 - procedure officer and conflicts of interest",
                "Law 241/1990 - access to records (documentary, civic, generalized)",
                "Law 241/1990 - tacit consent and services conference",
                "Administrative acts - essential elements and defects (nullity, voidability)",
                "Self-protection powers - revocation and ex officio annulment",
                "Presidential Decree 445/2000 - self-certifications and false declarations",
            ],
        )
        .with_topics(
            CRIMINAL_LAW,
            [
                "Embezzlement and embezzlement for use (art. 314 criminal code)",
                "Extortion and undue inducement (art. 317, 319-quater criminal code)",
                "Bribery - proper, improper and in judicial acts",
                "Abuse of office and refusal of official acts",
                "Public official versus person in charge of a public service",
            ],
        )
        .with_topics(
            DIGITAL_ADMINISTRATION,
            [
                "Legal value of the electronic document",
                "Electronic signatures (simple, advanced, qualified, digital)",
                "Certified e-mail, digital domicile and the national registry",
                "Digital identity systems (SPID, CIE, CNS)",
                "Compliant preservation and the preservation officer",
            ],
        )
        .with_topics(
            WORKPLACE_SAFETY,
            [
                "Non-delegable duties of the employer",
                "Roles - prevention officer, workers' representative, supervisor, company doctor",
                "Risk assessment document",
                "Personal protective equipment - classes and duties of use",
                "Emergency management and first aid",
            ],
        )
        .with_topics(
            PUBLIC_EMPLOYMENT,
            [
                "Leg. Decree 165/2001 - privatization of public employment",
                "Code of conduct (Presidential Decree 62/2013) - duties and gifts",
                "Disciplinary procedure - phases and deadlines",
                "Whistleblowing in public administration",
                "Access to public employment and reserved posts",
            ],
        )
        .with_topics(
            STATE_ACCOUNTING,
            [
                "State budget - annuality, integrity, universality",
                "Expenditure cycle - commitment, settlement, order, payment",
                "Receivables and payables carried forward",
                "Administrative and accounting liability and the Court of Auditors",
            ],
        )
        .with_topics(
            CULTURAL_HERITAGE,
            [
                "Cultural Heritage Code - definition of a cultural asset",
                "Verification of cultural interest and listing",
                "Protection versus enhancement",
                "Superintendencies and autonomous museums",
                "Art Bonus and patronage",
            ],
        )
        .with_topics(
            PUBLIC_CONTRACTS,
            [
                "Procurement Code (Leg. Decree 36/2023) - result and trust principles",
                "Sole project manager",
                "Thresholds for direct award and negotiated procedures",
                "Award criteria - best value versus lowest price",
                "Remedial assistance for bidders",
            ],
        )
        .with_topics(
            PUBLIC_COMMUNICATION,
            [
                "Law 150/2000 - public relations office, press office, spokesperson",
                "Institutional versus political communication",
                "Communication plan",
                "Web accessibility and transparency",
            ],
        )
        .with_topics(
            MINISTRY_STRUCTURE,
            [
                "Central organization - directorates general",
                "Peripheral organization - regional secretariats",
                "Museums and archaeological parks with autonomy",
                "Powers of the minister versus managers",
            ],
        )
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_weighted_subject_is_routed() {
        let weights = default_weights();
        assert_eq!(weights.len(), 16);
        assert_eq!(weights.weight_of(SITUATIONAL), Some(8.0));
        assert_eq!(tutor_for_subject(CULTURAL_HERITAGE), Tutor::Luna);
        assert_eq!(tutor_for_subject(ADMINISTRATIVE_LAW), Tutor::Maria);
        assert_eq!(tutor_for_subject(LOGIC), Tutor::Stella);
    }

    #[test]
    fn routing_strips_topic_and_falls_back() {
        let label = format!("{CRIMINAL_LAW}: Bribery");
        assert_eq!(tutor_for_subject(&label), Tutor::Maria);
        assert_eq!(tutor_for_subject(VERBAL_REASONING), Tutor::Stella);
        assert_eq!(tutor_for_subject("Astrophysics"), Tutor::fallback());
    }

    #[test]
    fn syllabus_lookup_uses_coarse_subject() {
        let s = syllabus();
        assert_eq!(s.topics_for(STATE_ACCOUNTING).len(), 4);
        assert_eq!(
            s.topics_for(&format!("{STATE_ACCOUNTING}: anything")).len(),
            4
        );
        assert!(s.topics_for(LOGIC).is_empty());
    }

    #[test]
    fn exam_pools_are_known_subjects() {
        let weights = default_weights();
        for subject in KNOWLEDGE_POOL {
            assert!(weights.weight_of(subject).is_some(), "{subject}");
        }
        assert!(is_situational(&format!("{SITUATIONAL}: Teamwork")));
        assert!(!is_situational(LOGIC));
    }
}
