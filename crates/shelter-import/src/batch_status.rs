//! Batch status changes on a shelter's animals.
//!
//! The whole request runs in one transaction. Ids outside the shelter
//! reject the request; an animal whose current status does not allow the
//! action is counted as failed and the rest proceed.

use std::str::FromStr;

use chrono::Utc;
use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::db::animal_repo::{self, Affiliation};
use crate::db::{Database, DatabaseError};
use crate::notify::{Notification, Notifier};

/// Error messages returned per request.
pub const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Error, Debug)]
pub enum BatchStatusError {
    #[error("No animals selected")]
    EmptySelection,

    #[error("Unknown action '{0}' (expected draft, submit, publish or retire)")]
    UnknownAction(String),

    #[error("Animals not found in shelter: {0:?}")]
    MissingAnimals(Vec<i64>),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimalStatus {
    Draft,
    Submitted,
    Published,
    Retired,
}

impl AnimalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnimalStatus::Draft => "DRAFT",
            AnimalStatus::Submitted => "SUBMITTED",
            AnimalStatus::Published => "PUBLISHED",
            AnimalStatus::Retired => "RETIRED",
        }
    }
}

impl FromStr for AnimalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(AnimalStatus::Draft),
            "SUBMITTED" => Ok(AnimalStatus::Submitted),
            "PUBLISHED" => Ok(AnimalStatus::Published),
            "RETIRED" => Ok(AnimalStatus::Retired),
            other => Err(format!("unknown animal status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Draft,
    Submit,
    Publish,
    Retire,
}

impl BatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchAction::Draft => "draft",
            BatchAction::Submit => "submit",
            BatchAction::Publish => "publish",
            BatchAction::Retire => "retire",
        }
    }

    /// Status the animal ends up in.
    pub fn target(self) -> AnimalStatus {
        match self {
            BatchAction::Draft => AnimalStatus::Draft,
            BatchAction::Submit => AnimalStatus::Submitted,
            BatchAction::Publish => AnimalStatus::Published,
            BatchAction::Retire => AnimalStatus::Retired,
        }
    }

    /// Whether an animal currently in `from` may take this action.
    pub fn allows(self, from: AnimalStatus) -> bool {
        use AnimalStatus::*;
        match self {
            BatchAction::Draft => matches!(from, Submitted | Published | Retired),
            BatchAction::Submit => from == Draft,
            BatchAction::Publish => matches!(from, Draft | Submitted),
            BatchAction::Retire => from == Published,
        }
    }

    fn requirement(self) -> &'static str {
        match self {
            BatchAction::Draft => "cannot be moved back to draft from its current status",
            BatchAction::Submit => "must be in draft to be submitted",
            BatchAction::Publish => "cannot be published from its current status",
            BatchAction::Retire => "must be published to be retired",
        }
    }
}

impl FromStr for BatchAction {
    type Err = BatchStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(BatchAction::Draft),
            "submit" => Ok(BatchAction::Submit),
            "publish" => Ok(BatchAction::Publish),
            "retire" => Ok(BatchAction::Retire),
            _ => Err(BatchStatusError::UnknownAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchUpdateReport {
    pub action: BatchAction,
    pub message: String,
    pub success_count: u32,
    pub failed_count: u32,
    pub total_count: u32,
    /// First failures, at most [`MAX_REPORTED_ERRORS`].
    pub errors: Vec<String>,
}

/// Applies `action` to every animal in `animal_ids` and notifies `actor_id`.
pub fn batch_update_status(
    db: &Database,
    notifier: &dyn Notifier,
    shelter_id: i64,
    actor_id: i64,
    animal_ids: &[i64],
    action: BatchAction,
) -> Result<BatchUpdateReport, BatchStatusError> {
    let mut ids: Vec<i64> = Vec::with_capacity(animal_ids.len());
    for id in animal_ids {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    if ids.is_empty() {
        return Err(BatchStatusError::EmptySelection);
    }

    let now = Utc::now().to_rfc3339();
    let (success_count, failed_count, errors) = db.transaction(|conn| {
        let found = animal_repo::ids_in_shelter(conn, shelter_id, &ids)?;
        let missing: Vec<i64> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
        if !missing.is_empty() {
            return Err(BatchStatusError::MissingAnimals(missing));
        }

        let mut success = 0u32;
        let mut failed = 0u32;
        let mut errors = Vec::new();
        for &id in &ids {
            let Some(animal) = animal_repo::find_by_id(conn, id)? else {
                return Err(BatchStatusError::MissingAnimals(vec![id]));
            };
            let current = animal
                .status
                .parse::<AnimalStatus>()
                .map_err(|reason| DatabaseError::Corrupt {
                    column: "status",
                    reason,
                })?;

            if action.allows(current) {
                animal_repo::update_status(conn, id, action.target().as_str(), &now)?;
                success += 1;
            } else {
                failed += 1;
                if errors.len() < MAX_REPORTED_ERRORS {
                    errors.push(format!(
                        "Animal {} ({}) {}",
                        id,
                        animal.name,
                        action.requirement()
                    ));
                }
            }
        }
        Ok::<_, BatchStatusError>((success, failed, errors))
    })?;

    let title = format!("Batch {} completed", action.as_str());
    let notification = Notification {
        recipient: actor_id,
        title: title.clone(),
        message: format!(
            "{} animals updated, {} failed",
            success_count, failed_count
        ),
        success_count,
        failed_count,
    };
    if let Err(e) = notifier.notify(&notification) {
        warn!("Batch {} notification for user {} failed: {}", action.as_str(), actor_id, e);
    }

    Ok(BatchUpdateReport {
        action,
        message: title,
        success_count,
        failed_count,
        total_count: ids.len() as u32,
        errors,
    })
}

/// Moves a shelter animal to another shelter or to a personal owner.
pub fn transfer_animal(
    db: &Database,
    shelter_id: i64,
    animal_id: i64,
    to: Affiliation,
) -> Result<(), BatchStatusError> {
    db.transaction(|conn| {
        if animal_repo::ids_in_shelter(conn, shelter_id, &[animal_id])?.is_empty() {
            return Err(BatchStatusError::MissingAnimals(vec![animal_id]));
        }
        animal_repo::reassign(conn, animal_id, to, &Utc::now().to_rfc3339())?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db::animal_repo::NewAnimal;
    use crate::notify::{LogNotifier, NotifyError};

    #[derive(Default)]
    struct Captured(Mutex<Vec<Notification>>);

    impl Notifier for Captured {
        fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp down".to_string()))
        }
    }

    fn animal(db: &Database, shelter_id: i64, name: &str, status: &str) -> i64 {
        db.with_conn(|conn| {
            let id = animal_repo::insert(
                conn,
                &NewAnimal {
                    name: name.to_string(),
                    species: "DOG".to_string(),
                    breed: None,
                    sex: "MALE".to_string(),
                    dob: None,
                    color: None,
                    description: None,
                    affiliation: Affiliation::Shelter(shelter_id),
                    created_by: 1,
                    import_job_id: None,
                    animal_code: None,
                },
                "2026-01-01T00:00:00Z",
            )?;
            animal_repo::update_status(conn, id, status, "2026-01-01T00:00:00Z")?;
            Ok(id)
        })
        .unwrap()
    }

    fn status_of(db: &Database, id: i64) -> String {
        db.with_conn(|conn| animal_repo::find_by_id(conn, id))
            .unwrap()
            .unwrap()
            .status
    }

    #[test]
    fn test_transition_rules() {
        use AnimalStatus::*;
        assert!(BatchAction::Draft.allows(Retired));
        assert!(!BatchAction::Draft.allows(Draft));
        assert!(BatchAction::Submit.allows(Draft));
        assert!(!BatchAction::Submit.allows(Published));
        assert!(BatchAction::Publish.allows(Submitted));
        assert!(BatchAction::Publish.allows(Draft));
        assert!(!BatchAction::Publish.allows(Retired));
        assert!(BatchAction::Retire.allows(Published));
        assert!(!BatchAction::Retire.allows(Draft));
    }

    #[test]
    fn test_parse_action() {
        assert_eq!("Publish".parse::<BatchAction>().unwrap(), BatchAction::Publish);
        assert!(matches!(
            "archive".parse::<BatchAction>(),
            Err(BatchStatusError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_batch_publish_counts_rule_violations() {
        let db = Database::open_in_memory().unwrap();
        let draft = animal(&db, 1, "Rex", "DRAFT");
        let retired = animal(&db, 1, "Old Tom", "RETIRED");
        let notifier = Captured::default();

        let report = batch_update_status(
            &db,
            &notifier,
            1,
            42,
            &[draft, retired, draft],
            BatchAction::Publish,
        )
        .unwrap();

        assert_eq!((report.success_count, report.failed_count), (1, 1));
        assert_eq!(report.total_count, 2);
        assert_eq!(
            report.errors,
            vec![format!(
                "Animal {} (Old Tom) cannot be published from its current status",
                retired
            )]
        );
        assert_eq!(status_of(&db, draft), "PUBLISHED");
        assert_eq!(status_of(&db, retired), "RETIRED");

        let sent = notifier.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, 42);
        assert_eq!(sent[0].title, "Batch publish completed");
        assert_eq!((sent[0].success_count, sent[0].failed_count), (1, 1));
    }

    #[test]
    fn test_foreign_animal_rejects_whole_request() {
        let db = Database::open_in_memory().unwrap();
        let ours = animal(&db, 1, "Rex", "DRAFT");
        let theirs = animal(&db, 2, "Max", "DRAFT");

        let err = batch_update_status(
            &db,
            &LogNotifier,
            1,
            42,
            &[ours, theirs, 999],
            BatchAction::Submit,
        )
        .unwrap_err();

        match err {
            BatchStatusError::MissingAnimals(missing) => assert_eq!(missing, vec![theirs, 999]),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(status_of(&db, ours), "DRAFT");
    }

    #[test]
    fn test_notifier_failure_is_not_propagated() {
        let db = Database::open_in_memory().unwrap();
        let id = animal(&db, 1, "Rex", "PUBLISHED");

        let report =
            batch_update_status(&db, &Broken, 1, 42, &[id], BatchAction::Retire).unwrap();

        assert_eq!(report.success_count, 1);
        assert_eq!(status_of(&db, id), "RETIRED");
    }

    #[test]
    fn test_error_list_is_capped() {
        let db = Database::open_in_memory().unwrap();
        let ids: Vec<i64> = (0..12)
            .map(|i| animal(&db, 1, &format!("A{}", i), "DRAFT"))
            .collect();

        let report =
            batch_update_status(&db, &LogNotifier, 1, 42, &ids, BatchAction::Retire)
                .unwrap();

        assert_eq!(report.failed_count, 12);
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_transfer_keeps_single_affiliation() {
        let db = Database::open_in_memory().unwrap();
        let id = animal(&db, 1, "Rex", "PUBLISHED");

        transfer_animal(&db, 1, id, Affiliation::Owner(77)).unwrap();

        let row = db
            .with_conn(|conn| animal_repo::find_by_id(conn, id))
            .unwrap()
            .unwrap();
        assert_eq!(row.affiliation().unwrap(), Affiliation::Owner(77));
        assert!(row.shelter_id.is_none());
        assert!(matches!(
            transfer_animal(&db, 1, id, Affiliation::Shelter(3)),
            Err(BatchStatusError::MissingAnimals(_))
        ));
    }
}
