use chrono::Duration;
use std::collections::HashMap;

use serde_json::json;
use storage::repository::{
    AttemptRepository, ModuleRepository, PageRepository, ProgressRepository, QuestionRepository,
    ResultRepository, SectionRepository, SessionRecord, SessionRepository, StorageError,
    UserRepository,
};
use storage::sqlite::SqliteRepository;
use training_core::model::{
    ModuleDraft, ModuleId, NewAssessmentResult, PageDraft, PageKind, ProgressStatus,
    ProgressUpdate, QuestionDraft, QuestionId, Role, SectionDraft, SectionId, UserId,
    UserProfile, grade_submission,
};
use training_core::time::fixed_now;

async fn repo(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!(
        "sqlite:file:memdb_{name}?mode=memory&cache=shared"
    ))
    .await
    .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn profile(id: &str, email: &str) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        email: email.to_owned(),
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        profile_image_url: None,
    }
}

async fn seed_section(repo: &SqliteRepository) -> (SectionId, ModuleId) {
    let section = repo
        .insert_section(
            &SectionDraft {
                title: "Phishing".into(),
                description: None,
                order: 0,
            },
            fixed_now(),
        )
        .await
        .unwrap();
    let module = repo
        .insert_module(
            &ModuleDraft {
                section_id: Some(section.id),
                title: "Spotting lures".into(),
                description: None,
                order: 0,
                estimated_minutes: Some(10),
            },
            fixed_now(),
        )
        .await
        .unwrap();
    (section.id, module.id)
}

#[tokio::test]
async fn login_upsert_refreshes_profile_but_keeps_role() {
    let repo = repo("user_upsert").await;
    let user = repo
        .upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    assert_eq!(user.role, Role::Employee);

    repo.set_role_by_email("ADA@corp.test", Role::Admin, fixed_now())
        .await
        .unwrap();

    let mut refreshed = profile("sub-1", "ada@corp.test");
    refreshed.first_name = Some("Augusta".into());
    let later = fixed_now() + Duration::hours(1);
    let user = repo.upsert_user(&refreshed, later).await.unwrap();
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.first_name.as_deref(), Some("Augusta"));
    assert_eq!(user.created_at, fixed_now());
    assert_eq!(user.updated_at, later);
    assert_eq!(repo.list_users().await.unwrap().len(), 1);

    assert!(matches!(
        repo.set_role_by_email("nobody@corp.test", Role::Admin, fixed_now())
            .await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sessions_expire_and_purge() {
    let repo = repo("sessions").await;
    repo.upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    for (token, ttl) in [("live", 2), ("stale", -2)] {
        repo.create_session(&SessionRecord {
            token: token.into(),
            user_id: UserId::new("sub-1"),
            created_at: fixed_now(),
            expires_at: fixed_now() + Duration::hours(ttl),
        })
        .await
        .unwrap();
    }

    assert_eq!(repo.purge_expired(fixed_now()).await.unwrap(), 1);
    assert!(repo.get_session("stale").await.unwrap().is_none());
    let live = repo.get_session("live").await.unwrap().unwrap();
    assert!(!live.is_expired(fixed_now()));

    repo.delete_session("live").await.unwrap();
    repo.delete_session("live").await.unwrap();
    assert!(repo.get_session("live").await.unwrap().is_none());
}

#[tokio::test]
async fn module_section_reference_must_exist() {
    let repo = repo("module_fk").await;
    let err = repo
        .insert_module(
            &ModuleDraft {
                section_id: Some(SectionId::new(404)),
                title: "Orphan".into(),
                description: None,
                order: 0,
                estimated_minutes: None,
            },
            fixed_now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let (section, module) = seed_section(&repo).await;
    let moved = repo.assign_section(module, None, fixed_now()).await.unwrap();
    assert_eq!(moved.section_id, None);
    assert!(matches!(
        repo.assign_section(module, Some(SectionId::new(404)), fixed_now())
            .await,
        Err(StorageError::Conflict)
    ));
    let moved = repo
        .assign_section(module, Some(section), fixed_now())
        .await
        .unwrap();
    assert_eq!(moved.section_id, Some(section));
}

#[tokio::test]
async fn progress_upsert_overwrites_instead_of_duplicating() {
    let repo = repo("progress_upsert").await;
    repo.upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    let (_, module) = seed_section(&repo).await;
    let page = repo
        .insert_page(
            &PageDraft {
                module_id: module,
                page_order: 0,
                kind: PageKind::Text,
                title: None,
                content: Some("<p>Hover before you click.</p>".into()),
            },
            fixed_now(),
        )
        .await
        .unwrap();

    let user = UserId::new("sub-1");
    let first = ProgressUpdate::page_view(None, user.clone(), module, page.id, fixed_now());
    let stored = repo.upsert_progress(&first).await.unwrap();
    assert_eq!(stored.status, ProgressStatus::InProgress);

    let done = ProgressUpdate::completion(Some(&stored), user.clone(), module, None, fixed_now())
        .unwrap();
    let stored = repo.upsert_progress(&done).await.unwrap();
    assert_eq!(stored.status, ProgressStatus::Completed);
    assert_eq!(stored.last_viewed_page_id, Some(page.id));

    let rows = repo.list_progress_for_user(&user).await.unwrap();
    assert_eq!(rows.len(), 1);
    let report = repo.list_all_progress().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].user.email, "ada@corp.test");
    assert_eq!(report[0].module.id, module);
}

#[tokio::test]
async fn deleting_a_section_removes_everything_scoped_to_it() {
    let repo = repo("section_cascade").await;
    repo.upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    let user = UserId::new("sub-1");
    let (section, module) = seed_section(&repo).await;
    let (other_section, other_module) = seed_section(&repo).await;

    for m in [module, other_module] {
        let page = repo
            .insert_page(
                &PageDraft {
                    module_id: m,
                    page_order: 0,
                    kind: PageKind::Text,
                    title: None,
                    content: Some("body".into()),
                },
                fixed_now(),
            )
            .await
            .unwrap();
        repo.upsert_progress(&ProgressUpdate::page_view(
            None,
            user.clone(),
            m,
            page.id,
            fixed_now(),
        ))
        .await
        .unwrap();
    }

    let question = QuestionDraft {
        section_id: section,
        question: "Which link is safe?".into(),
        options: vec!["bit.ly/x".into(), "corp.test/login".into()],
        correct_answer: "b".into(),
        order: 0,
    }
    .validate()
    .unwrap();
    let question = repo.insert_question(&question, fixed_now()).await.unwrap();
    repo.start_attempt(&user, section, fixed_now()).await.unwrap();
    let answers: HashMap<QuestionId, serde_json::Value> =
        [(question.id, json!(1))].into_iter().collect();
    let (outcome, sheet) = grade_submission(&[question], &answers).unwrap();
    repo.insert_result(&NewAssessmentResult {
        user_id: user.clone(),
        section_id: section,
        outcome,
        answers: sheet,
        date_taken: fixed_now(),
    })
    .await
    .unwrap();

    repo.delete_section(section).await.unwrap();

    assert!(repo.get_section(section).await.unwrap().is_none());
    assert!(repo.get_module(module).await.unwrap().is_none());
    assert!(repo.list_pages(module).await.unwrap().is_empty());
    assert!(repo.get_progress(&user, module).await.unwrap().is_none());
    assert!(repo.list_questions_by_section(section).await.unwrap().is_empty());
    assert!(repo.get_attempt(&user, section).await.unwrap().is_none());
    assert!(repo.list_results_for_user(&user).await.unwrap().is_empty());

    assert!(repo.get_section(other_section).await.unwrap().is_some());
    assert_eq!(repo.list_pages(other_module).await.unwrap().len(), 1);
    assert!(repo.get_progress(&user, other_module).await.unwrap().is_some());

    assert!(matches!(
        repo.delete_section(section).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn deleting_a_module_removes_pages_and_progress() {
    let repo = repo("module_cascade").await;
    repo.upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    let user = UserId::new("sub-1");
    let (section, module) = seed_section(&repo).await;
    let page = repo
        .insert_page(
            &PageDraft {
                module_id: module,
                page_order: 0,
                kind: PageKind::Video,
                title: Some("Intro".into()),
                content: Some("https://media.corp.test/intro.mp4".into()),
            },
            fixed_now(),
        )
        .await
        .unwrap();
    repo.upsert_progress(&ProgressUpdate::page_view(
        None,
        user.clone(),
        module,
        page.id,
        fixed_now(),
    ))
    .await
    .unwrap();

    repo.delete_module(module).await.unwrap();

    assert!(repo.get_page(page.id).await.unwrap().is_none());
    assert!(repo.get_progress(&user, module).await.unwrap().is_none());
    assert!(repo.list_modules_by_section(section).await.unwrap().is_empty());
    assert!(matches!(
        repo.delete_module(module).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn second_passing_result_conflicts_but_failures_accumulate() {
    let repo = repo("single_pass").await;
    repo.upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    let user = UserId::new("sub-1");
    let (section, _) = seed_section(&repo).await;
    let question = repo
        .insert_question(
            &QuestionDraft {
                section_id: section,
                question: "Report phishing to?".into(),
                options: vec!["Nobody".into(), "Security team".into()],
                correct_answer: "Security team".into(),
                order: 0,
            }
            .validate()
            .unwrap(),
            fixed_now(),
        )
        .await
        .unwrap();
    let stored = repo.get_question(question.id).await.unwrap().unwrap();
    assert_eq!(stored.answer_key.index(), 1);

    let submit = |answer: serde_json::Value| {
        let answers: HashMap<QuestionId, serde_json::Value> =
            [(question.id, answer)].into_iter().collect();
        let (outcome, sheet) = grade_submission(std::slice::from_ref(&stored), &answers).unwrap();
        NewAssessmentResult {
            user_id: user.clone(),
            section_id: section,
            outcome,
            answers: sheet,
            date_taken: fixed_now(),
        }
    };

    repo.insert_result(&submit(json!(0))).await.unwrap();
    repo.insert_result(&submit(json!("a"))).await.unwrap();
    let passed = repo.insert_result(&submit(json!(1))).await.unwrap();
    assert!(passed.passed);
    assert!(matches!(
        repo.insert_result(&submit(json!("b"))).await,
        Err(StorageError::Conflict)
    ));
    assert_eq!(repo.list_results_for_user(&user).await.unwrap().len(), 3);

    repo.mark_certificate_issued(passed.id).await.unwrap();
    let fetched = repo.get_result(passed.id).await.unwrap().unwrap();
    assert!(fetched.certificate_generated);
    assert_eq!(fetched.answers.get(&question.id).map(|k| k.index()), Some(1));

    let report = repo.list_all_results().await.unwrap();
    assert_eq!(report.len(), 3);
    assert_eq!(report[0].user.id, user);

    assert_eq!(
        repo.delete_results_for_user(&user, Some(section)).await.unwrap(),
        3
    );
    repo.insert_result(&submit(json!(1))).await.unwrap();
}

#[tokio::test]
async fn restarting_an_attempt_keeps_the_original_clock() {
    let repo = repo("attempt_clock").await;
    repo.upsert_user(&profile("sub-1", "ada@corp.test"), fixed_now())
        .await
        .unwrap();
    let user = UserId::new("sub-1");
    let (section, _) = seed_section(&repo).await;

    let first = repo.start_attempt(&user, section, fixed_now()).await.unwrap();
    let again = repo
        .start_attempt(&user, section, fixed_now() + Duration::minutes(20))
        .await
        .unwrap();
    assert_eq!(again.started_at, first.started_at);

    repo.close_attempt(&user, section).await.unwrap();
    assert!(repo.get_attempt(&user, section).await.unwrap().is_none());
    let fresh = repo
        .start_attempt(&user, section, fixed_now() + Duration::minutes(40))
        .await
        .unwrap();
    assert_eq!(fresh.started_at, fixed_now() + Duration::minutes(40));
}
