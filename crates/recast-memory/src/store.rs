use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::task;

use recast_schema::{
    Artifact, Session, SessionInputs, SessionMode, SessionStatus, Source, SourceFilters,
    SourceType,
};

use crate::migrations::run_migrations;

/// Sqlite-backed store for background sources and generation sessions.
///
/// Single-row atomic updates only; callers never need multi-row
/// transactional guarantees.
#[derive(Clone)]
pub struct KnowledgeStore {
    db: Arc<Mutex<Connection>>,
}

/// Partial update applied to a stored source; `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub topics: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl KnowledgeStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    pub async fn insert_source(&self, source: Source) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let topics = serde_json::to_string(&source.topics)?;
            let tags = serde_json::to_string(&source.tags)?;
            let conn = lock(&db)?;
            conn.execute(
                r#"
                INSERT INTO sources (
                    id, source_type, title, content, summary, topics, tags,
                    use_count, last_used_at, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    source.id,
                    source.source_type.as_str(),
                    source.title,
                    source.content,
                    source.summary,
                    topics,
                    tags,
                    source.use_count,
                    source.last_used_at.map(|t| t.to_rfc3339()),
                    source.created_at.to_rfc3339(),
                    source.updated_at.to_rfc3339(),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let source = conn
                .query_row(
                    &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                    params![id],
                    row_to_source,
                )
                .optional()?;
            Ok::<Option<Source>, anyhow::Error>(source)
        })
        .await?
    }

    /// List sources matching the structural filters, most recently updated
    /// first. Within a filter category values are OR-ed; categories are
    /// AND-ed together.
    pub async fn list_sources(
        &self,
        filters: &SourceFilters,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Source>> {
        let db = Arc::clone(&self.db);
        let filters = filters.clone();
        task::spawn_blocking(move || {
            let mut clauses: Vec<String> = Vec::new();
            let mut args: Vec<String> = Vec::new();

            if !filters.source_types.is_empty() {
                let marks = vec!["?"; filters.source_types.len()].join(", ");
                clauses.push(format!("source_type IN ({marks})"));
                args.extend(
                    filters
                        .source_types
                        .iter()
                        .map(|t| t.as_str().to_string()),
                );
            }
            if !filters.tags.is_empty() {
                let ors = vec!["tags LIKE ?"; filters.tags.len()].join(" OR ");
                clauses.push(format!("({ors})"));
                args.extend(filters.tags.iter().map(|t| format!("%\"{t}\"%")));
            }
            if !filters.topics.is_empty() {
                let ors = vec!["topics LIKE ?"; filters.topics.len()].join(" OR ");
                clauses.push(format!("({ors})"));
                args.extend(filters.topics.iter().map(|t| format!("%\"{t}\"%")));
            }

            let mut sql = format!("SELECT {SOURCE_COLUMNS} FROM sources");
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(&format!(
                " ORDER BY updated_at DESC LIMIT {limit} OFFSET {offset}"
            ));

            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), row_to_source)?;
            let mut sources = Vec::new();
            for row in rows {
                sources.push(row?);
            }
            Ok::<Vec<Source>, anyhow::Error>(sources)
        })
        .await?
    }

    pub async fn update_source(&self, id: &str, update: SourceUpdate) -> Result<Option<Source>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let existing = conn
                .query_row(
                    &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                    params![id],
                    row_to_source,
                )
                .optional()?;
            let Some(mut source) = existing else {
                return Ok::<Option<Source>, anyhow::Error>(None);
            };

            if let Some(title) = update.title {
                source.title = title;
            }
            if let Some(content) = update.content {
                source.content = content;
            }
            if let Some(summary) = update.summary {
                source.summary = Some(summary);
            }
            if let Some(topics) = update.topics {
                source.topics = topics;
            }
            if let Some(tags) = update.tags {
                source.tags = tags;
            }
            source.updated_at = Utc::now();

            conn.execute(
                r#"
                UPDATE sources SET
                    title = ?2, content = ?3, summary = ?4,
                    topics = ?5, tags = ?6, updated_at = ?7
                WHERE id = ?1
                "#,
                params![
                    source.id,
                    source.title,
                    source.content,
                    source.summary,
                    serde_json::to_string(&source.topics)?,
                    serde_json::to_string(&source.tags)?,
                    source.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(Some(source))
        })
        .await?
    }

    pub async fn delete_source(&self, id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let affected = conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
            Ok::<bool, anyhow::Error>(affected > 0)
        })
        .await?
    }

    /// Bump `use_count` and stamp `last_used_at` after a source feeds a
    /// generation run.
    pub async fn record_use(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "UPDATE sources SET use_count = use_count + 1, last_used_at = ?2 WHERE id = ?1",
                params![id, Utc::now().to_rfc3339()],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub async fn insert_session(&self, session: Session) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                r#"
                INSERT INTO sessions (
                    id, mode, inputs, matched_source_ids, discovered_source_ids,
                    artifacts, status, error, created_at, completed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    session.id,
                    session.mode.as_str(),
                    serde_json::to_string(&session.inputs)?,
                    serde_json::to_string(&session.matched_source_ids)?,
                    serde_json::to_string(&session.discovered_source_ids)?,
                    serde_json::to_string(&session.artifacts)?,
                    session.status.as_str(),
                    session.error,
                    session.created_at.to_rfc3339(),
                    session.completed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                    params![id],
                    row_to_session,
                )
                .optional()?;
            Ok::<Option<Session>, anyhow::Error>(session)
        })
        .await?
    }

    pub async fn mark_processing(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "UPDATE sessions SET status = 'processing' WHERE id = ?1 AND completed_at IS NULL",
                params![id],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    pub async fn mark_completed(
        &self,
        id: &str,
        matched_source_ids: &[String],
        discovered_source_ids: &[String],
        artifacts: &[Artifact],
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        let matched = serde_json::to_string(matched_source_ids)?;
        let discovered = serde_json::to_string(discovered_source_ids)?;
        let artifacts = serde_json::to_string(artifacts)?;
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            // COALESCE keeps completed_at from being rewritten if a terminal
            // state was already recorded.
            conn.execute(
                r#"
                UPDATE sessions SET
                    status = 'completed',
                    matched_source_ids = ?2,
                    discovered_source_ids = ?3,
                    artifacts = ?4,
                    completed_at = COALESCE(completed_at, ?5)
                WHERE id = ?1
                "#,
                params![id, matched, discovered, artifacts, Utc::now().to_rfc3339()],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        let error = error.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                r#"
                UPDATE sessions SET
                    status = 'failed',
                    error = ?2,
                    completed_at = COALESCE(completed_at, ?3)
                WHERE id = ?1
                "#,
                params![id, error, Utc::now().to_rfc3339()],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }
}

fn lock(db: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|_| anyhow!("failed to lock sqlite connection"))
}

const SOURCE_COLUMNS: &str = "id, source_type, title, content, summary, topics, tags, \
     use_count, last_used_at, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, mode, inputs, matched_source_ids, discovered_source_ids, \
     artifacts, status, error, created_at, completed_at";

fn row_to_source(row: &Row<'_>) -> rusqlite::Result<Source> {
    let type_raw: String = row.get(1)?;
    let topics_raw: String = row.get(5)?;
    let tags_raw: String = row.get(6)?;
    let last_used_raw: Option<String> = row.get(8)?;
    let created_raw: String = row.get(9)?;
    let updated_raw: String = row.get(10)?;

    Ok(Source {
        id: row.get(0)?,
        source_type: SourceType::parse(&type_raw).unwrap_or(SourceType::Text),
        title: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        topics: serde_json::from_str(&topics_raw).unwrap_or_default(),
        tags: serde_json::from_str(&tags_raw).unwrap_or_default(),
        use_count: row.get(7)?,
        last_used_at: match last_used_raw {
            Some(raw) => Some(parse_datetime_sql(&raw)?),
            None => None,
        },
        created_at: parse_datetime_sql(&created_raw)?,
        updated_at: parse_datetime_sql(&updated_raw)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let mode_raw: String = row.get(1)?;
    let inputs_raw: String = row.get(2)?;
    let matched_raw: String = row.get(3)?;
    let discovered_raw: String = row.get(4)?;
    let artifacts_raw: String = row.get(5)?;
    let status_raw: String = row.get(6)?;
    let created_raw: String = row.get(8)?;
    let completed_raw: Option<String> = row.get(9)?;

    let inputs: SessionInputs = serde_json::from_str(&inputs_raw).unwrap_or_default();
    let artifacts: Vec<Artifact> = serde_json::from_str(&artifacts_raw).unwrap_or_default();

    Ok(Session {
        id: row.get(0)?,
        mode: SessionMode::parse(&mode_raw).unwrap_or(SessionMode::Vision),
        inputs,
        matched_source_ids: serde_json::from_str(&matched_raw).unwrap_or_default(),
        discovered_source_ids: serde_json::from_str(&discovered_raw).unwrap_or_default(),
        artifacts,
        status: SessionStatus::parse(&status_raw).unwrap_or(SessionStatus::Failed),
        error: row.get(7)?,
        created_at: parse_datetime_sql(&created_raw)?,
        completed_at: match completed_raw {
            Some(raw) => Some(parse_datetime_sql(&raw)?),
            None => None,
        },
    })
}

fn parse_datetime_sql(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_schema::{SessionInputs, SessionMode, Source, SourceType};

    fn sample_source(title: &str, tags: &[&str]) -> Source {
        let mut source = Source::new(SourceType::Text, title, "sample body text");
        source.tags = tags.iter().map(|t| t.to_string()).collect();
        source
    }

    #[tokio::test]
    async fn source_round_trips_through_sqlite() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let mut source = sample_source("Shopify launch notes", &["ecommerce"]);
        source.topics = vec!["store design".to_string()];
        let id = source.id.clone();
        store.insert_source(source).await.unwrap();

        let loaded = store.get_source(&id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Shopify launch notes");
        assert_eq!(loaded.topics, vec!["store design"]);
        assert_eq!(loaded.use_count, 0);
    }

    #[tokio::test]
    async fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recast.db");
        let path = path.to_str().unwrap();

        {
            let store = KnowledgeStore::open(path).unwrap();
            store
                .insert_source(sample_source("persisted", &["keep"]))
                .await
                .unwrap();
        }

        let store = KnowledgeStore::open(path).unwrap();
        let found = store
            .list_sources(&SourceFilters::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "persisted");
        assert_eq!(found[0].tags, vec!["keep"]);
    }

    #[tokio::test]
    async fn list_sources_filters_by_tag_and_type() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        store
            .insert_source(sample_source("tagged", &["ads"]))
            .await
            .unwrap();
        store
            .insert_source(sample_source("untagged", &[]))
            .await
            .unwrap();

        let filters = SourceFilters {
            tags: vec!["ads".to_string()],
            ..SourceFilters::default()
        };
        let found = store.list_sources(&filters, 10, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "tagged");

        let filters = SourceFilters {
            source_types: vec![SourceType::Youtube],
            ..SourceFilters::default()
        };
        assert!(store.list_sources(&filters, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_use_increments_and_stamps() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let source = sample_source("used", &[]);
        let id = source.id.clone();
        store.insert_source(source).await.unwrap();

        store.record_use(&id).await.unwrap();
        store.record_use(&id).await.unwrap();

        let loaded = store.get_source(&id).await.unwrap().unwrap();
        assert_eq!(loaded.use_count, 2);
        assert!(loaded.last_used_at.is_some());
    }

    #[tokio::test]
    async fn update_source_touches_only_given_fields() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let source = sample_source("before", &["keep"]);
        let id = source.id.clone();
        store.insert_source(source).await.unwrap();

        let updated = store
            .update_source(
                &id,
                SourceUpdate {
                    summary: Some("a short summary".to_string()),
                    ..SourceUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "before");
        assert_eq!(updated.summary.as_deref(), Some("a short summary"));
        assert_eq!(updated.tags, vec!["keep"]);
    }

    #[tokio::test]
    async fn delete_source_reports_whether_row_existed() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let source = sample_source("doomed", &[]);
        let id = source.id.clone();
        store.insert_source(source).await.unwrap();

        assert!(store.delete_source(&id).await.unwrap());
        assert!(!store.delete_source(&id).await.unwrap());
    }

    #[tokio::test]
    async fn session_lifecycle_sets_completed_at_exactly_once() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let session = Session::new(SessionMode::Vision, SessionInputs::default());
        let id = session.id.clone();
        store.insert_session(session).await.unwrap();

        store.mark_processing(&id).await.unwrap();
        let processing = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(processing.status, SessionStatus::Processing);
        assert!(processing.completed_at.is_none());

        store.mark_completed(&id, &[], &[], &[]).await.unwrap();
        let completed = store.get_session(&id).await.unwrap().unwrap();
        let first_completion = completed.completed_at.unwrap();

        // A second terminal write must not move the completion timestamp.
        store.mark_failed(&id, "late failure").await.unwrap();
        let after = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(after.completed_at.unwrap(), first_completion);
    }

    #[tokio::test]
    async fn failed_session_keeps_error_message() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let session = Session::new(SessionMode::Single, SessionInputs::default());
        let id = session.id.clone();
        store.insert_session(session).await.unwrap();

        store.mark_failed(&id, "source not found: src_x").await.unwrap();
        let failed = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(failed.status, SessionStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("source not found: src_x"));
        assert!(failed.completed_at.is_some());
    }
}
