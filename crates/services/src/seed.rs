//! Sample training content for local development.

use training_core::model::{ModuleDraft, PageKind, QuestionDraft, SectionDraft, SectionId};

use crate::assessment_service::AssessmentService;
use crate::error::SeedError;
use crate::module_service::{ModuleService, NewPage};
use crate::section_service::SectionService;

pub const SAMPLE_SECTION_TITLE: &str = "Password & Authentication";

/// What a seeding run inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted {
        section_id: SectionId,
        modules: usize,
        questions: usize,
    },
    AlreadyPresent(SectionId),
}

struct SampleQuestion {
    question: &'static str,
    options: [&'static str; 4],
    answer: &'static str,
}

const QUESTIONS: [SampleQuestion; 5] = [
    SampleQuestion {
        question: "What is the recommended minimum length for a strong password?",
        options: ["6 characters", "8 characters", "12 characters", "16 characters"],
        answer: "c",
    },
    SampleQuestion {
        question: "Which of the following is NOT a good password practice?",
        options: [
            "Using a mix of uppercase and lowercase letters",
            "Including numbers and special characters",
            "Using your pet's name as your password",
            "Changing passwords regularly",
        ],
        answer: "c",
    },
    SampleQuestion {
        question: "What is two-factor authentication (2FA)?",
        options: [
            "Using two different passwords for the same account",
            "A security method that requires two forms of identification",
            "Having two email addresses for backup",
            "Using both a username and password",
        ],
        answer: "b",
    },
    SampleQuestion {
        question: "Which authentication method is considered the most secure?",
        options: [
            "Password only",
            "SMS-based 2FA",
            "Authenticator app-based 2FA",
            "Email-based verification",
        ],
        answer: "c",
    },
    SampleQuestion {
        question: "What should you do if you suspect your password has been compromised?",
        options: [
            "Wait and see if anything happens",
            "Change your password immediately",
            "Tell your friends about it",
            "Ignore it and hope for the best",
        ],
        answer: "b",
    },
];

const MODULES: [(&str, &str, i32, [&str; 2]); 2] = [
    (
        "Creating Strong Passwords",
        "Length, passphrases and password managers.",
        10,
        [
            "A strong password is long. Aim for at least 12 characters, or use a passphrase of several unrelated words.",
            "Never reuse passwords between accounts. A password manager generates and remembers unique passwords for you.",
        ],
    ),
    (
        "Multi-Factor Authentication",
        "Why a second factor stops most account takeovers.",
        8,
        [
            "Two-factor authentication combines something you know with something you have, such as an authenticator app.",
            "If you suspect a password was exposed, change it immediately and report the incident to the security team.",
        ],
    ),
];

/// Insert the sample section with its modules and assessment unless a
/// section with the same title already exists.
///
/// # Errors
///
/// Returns `SeedError` if any service call fails.
pub async fn seed_sample_content(
    sections: &SectionService,
    modules: &ModuleService,
    assessments: &AssessmentService,
) -> Result<SeedOutcome, SeedError> {
    if let Some(existing) = sections
        .list_sections()
        .await?
        .into_iter()
        .find(|s| s.title == SAMPLE_SECTION_TITLE)
    {
        return Ok(SeedOutcome::AlreadyPresent(existing.id));
    }

    let section = sections
        .create_section(SectionDraft {
            title: SAMPLE_SECTION_TITLE.into(),
            description: Some("Protect your accounts with strong credentials.".into()),
            order: 1,
        })
        .await?;

    for (order, (title, description, minutes, pages)) in (1..).zip(MODULES) {
        let module = modules
            .create_module(ModuleDraft {
                section_id: Some(section.id),
                title: title.into(),
                description: Some(description.into()),
                order,
                estimated_minutes: Some(minutes),
            })
            .await?;
        for (page_order, body) in (1..).zip(pages) {
            modules
                .create_page(
                    module.id,
                    NewPage {
                        page_order,
                        kind: PageKind::Text,
                        title: None,
                        content: Some(body.into()),
                    },
                )
                .await?;
        }
    }

    for (order, sample) in (1..).zip(&QUESTIONS) {
        assessments
            .create_question(QuestionDraft {
                section_id: section.id,
                question: sample.question.into(),
                options: sample.options.iter().map(|o| (*o).to_owned()).collect(),
                correct_answer: sample.answer.into(),
                order,
            })
            .await?;
    }

    tracing::info!(section_id = %section.id, "sample content seeded");
    Ok(SeedOutcome::Inserted {
        section_id: section.id,
        modules: MODULES.len(),
        questions: QUESTIONS.len(),
    })
}
