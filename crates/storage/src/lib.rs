use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use navigator::{tree::cascade_order, QuestionStore};
use shared::domain::{attach_children, Media, MediaKind, NodeId, QuestionNode, UserId};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

const NODE_COLUMNS: &str = "id, lang, text, answer, file_type, file_id, parent_id";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Languages that have at least one question, with their node counts.
    pub async fn language_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT lang, COUNT(*) FROM questions GROUP BY lang ORDER BY lang")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>(0), r.get::<i64, _>(1)))
            .collect())
    }

    async fn child_ids(&self, parent_id: NodeId) -> Result<Vec<NodeId>> {
        let rows = sqlx::query("SELECT id FROM questions WHERE parent_id = ? ORDER BY id")
            .bind(parent_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| NodeId(r.get::<i64, _>(0)))
            .collect())
    }
}

#[async_trait]
impl QuestionStore for Storage {
    async fn questions_by_language(&self, language: &str) -> Result<Vec<QuestionNode>> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM questions WHERE lang = ? ORDER BY id"
        ))
        .bind(language)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to load questions for language '{language}'"))?;

        let mut nodes = rows.iter().map(node_from_row).collect::<Result<Vec<_>>>()?;
        attach_children(&mut nodes);
        Ok(nodes)
    }

    async fn children_of(&self, parent_id: NodeId) -> Result<Vec<QuestionNode>> {
        let filter = if parent_id.is_root() {
            "parent_id IS NULL"
        } else {
            "parent_id = ?"
        };

        let nodes_sql = format!("SELECT {NODE_COLUMNS} FROM questions WHERE {filter} ORDER BY id");
        let links_sql = format!(
            "SELECT id, parent_id FROM questions
             WHERE parent_id IN (SELECT id FROM questions WHERE {filter}) ORDER BY id"
        );
        let mut nodes = sqlx::query(&nodes_sql);
        let mut links = sqlx::query(&links_sql);
        if !parent_id.is_root() {
            nodes = nodes.bind(parent_id.0);
            links = links.bind(parent_id.0);
        }

        let rows = nodes.fetch_all(&self.pool).await?;
        let mut children = rows.iter().map(node_from_row).collect::<Result<Vec<_>>>()?;

        for link in links.fetch_all(&self.pool).await? {
            let id = NodeId(link.get::<i64, _>(0));
            let parent = NodeId(link.get::<i64, _>(1));
            if let Some(child) = children.iter_mut().find(|c| c.id == parent) {
                child.children.push(id);
            }
        }
        Ok(children)
    }

    async fn node_by_id(&self, id: NodeId) -> Result<Option<QuestionNode>> {
        let row = sqlx::query(&format!("SELECT {NODE_COLUMNS} FROM questions WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut node = node_from_row(&row)?;
        node.children = self.child_ids(id).await?;
        Ok(Some(node))
    }

    async fn language_of(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT lang FROM user_languages WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn set_language(&self, user_id: UserId, language: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_languages (user_id, lang) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET lang=excluded.lang, updated_at=CURRENT_TIMESTAMP",
        )
        .bind(user_id.0)
        .bind(language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_node(
        &self,
        language: &str,
        text: &str,
        answer: &str,
        parent_id: NodeId,
    ) -> Result<NodeId> {
        let mut tx = self.pool.begin().await?;

        if !parent_id.is_root() {
            let parent_language = sqlx::query("SELECT lang FROM questions WHERE id = ?")
                .bind(parent_id.0)
                .fetch_optional(&mut *tx)
                .await?
                .map(|r| r.get::<String, _>(0));
            match parent_language {
                None => bail!("parent question {parent_id} does not exist"),
                Some(lang) if lang != language => bail!(
                    "parent question {parent_id} is in language '{lang}', not '{language}'"
                ),
                Some(_) => {}
            }
        }

        let rec = sqlx::query(
            "INSERT INTO questions (lang, text, answer, parent_id) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(language)
        .bind(text)
        .bind(answer)
        .bind((!parent_id.is_root()).then_some(parent_id.0))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(NodeId(rec.get::<i64, _>(0)))
    }

    async fn update_node(&self, id: NodeId, text: &str, answer: &str) -> Result<()> {
        let affected = sqlx::query(
            "UPDATE questions SET text = ?, answer = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(text)
        .bind(answer)
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            bail!("question {id} does not exist");
        }
        Ok(())
    }

    async fn update_media(&self, id: NodeId, media: &Media) -> Result<()> {
        let affected = sqlx::query(
            "UPDATE questions SET file_type = ?, file_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(media.kind.as_str())
        .bind(&media.handle)
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            bail!("question {id} does not exist");
        }
        Ok(())
    }

    async fn delete_node(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM questions WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Ok(Vec::new());
        }

        let links: Vec<(NodeId, NodeId)> =
            sqlx::query("SELECT id, COALESCE(parent_id, 0) FROM questions")
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(|r| (NodeId(r.get::<i64, _>(0)), NodeId(r.get::<i64, _>(1))))
                .collect();
        let order = cascade_order(&links, id);

        for doomed in &order {
            sqlx::query("DELETE FROM questions WHERE id = ?")
                .bind(doomed.0)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to delete question {doomed}"))?;
        }

        tx.commit().await?;
        debug!(node_id = id.0, count = order.len(), "question subtree deleted");
        Ok(order)
    }
}

fn node_from_row(row: &SqliteRow) -> Result<QuestionNode> {
    let file_type: Option<String> = row.try_get("file_type")?;
    let file_id: Option<String> = row.try_get("file_id")?;
    let media = match (file_type.as_deref().and_then(MediaKind::parse), file_id) {
        (Some(kind), Some(handle)) if !handle.is_empty() => Some(Media { kind, handle }),
        _ => None,
    };

    Ok(QuestionNode {
        id: NodeId(row.try_get("id")?),
        language: row.try_get("lang")?,
        text: row.try_get("text")?,
        answer: row.try_get("answer")?,
        media,
        parent_id: NodeId(row.try_get::<Option<i64>, _>("parent_id")?.unwrap_or(0)),
        children: Vec::new(),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
