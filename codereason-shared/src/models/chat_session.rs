/// Chat sessions and their messages
///
/// A session lives in a workspace and holds an ordered transcript of
/// messages between a user and the reasoning assistant.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE chat_message_role AS ENUM ('USER', 'ASSISTANT', 'SYSTEM');
///
/// CREATE TABLE chat_sessions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     workspace_id UUID NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE chat_messages (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     session_id UUID NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
///     role chat_message_role NOT NULL,
///     content TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_message_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatMessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub workspace_id: Uuid,

    /// User who started the session
    pub user_id: Uuid,

    pub title: String,
    pub created_at: DateTime<Utc>,

    /// Bumped whenever a message is appended
    pub updated_at: DateTime<Utc>,
}

/// Session row with its message count, for lists
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionSummary {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: ChatMessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Title given to sessions created without one
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

impl ChatSession {
    pub async fn create(
        pool: &PgPool,
        workspace_id: Uuid,
        user_id: Uuid,
        title: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let session = sqlx::query_as::<_, ChatSession>(
            r#"
            INSERT INTO chat_sessions (workspace_id, user_id, title)
            VALUES ($1, $2, $3)
            RETURNING id, workspace_id, user_id, title, created_at, updated_at
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(title.unwrap_or(DEFAULT_SESSION_TITLE))
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, ChatSession>(
            r#"
            SELECT id, workspace_id, user_id, title, created_at, updated_at
            FROM chat_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Lists sessions of a workspace, most recently active first
    pub async fn list_by_workspace(
        pool: &PgPool,
        workspace_id: Uuid,
    ) -> Result<Vec<ChatSessionSummary>, sqlx::Error> {
        let sessions = sqlx::query_as::<_, ChatSessionSummary>(
            r#"
            SELECT s.id, s.workspace_id, s.user_id, s.title,
                   (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id) AS message_count,
                   s.created_at, s.updated_at
            FROM chat_sessions s
            WHERE s.workspace_id = $1
            ORDER BY s.updated_at DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }

    pub async fn rename(pool: &PgPool, id: Uuid, title: &str) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, ChatSession>(
            r#"
            UPDATE chat_sessions
            SET title = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, workspace_id, user_id, title, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(title)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Messages of a session in the order they were written
    pub async fn messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Appends a message and bumps the session's activity timestamp
    pub async fn append_message(
        pool: &PgPool,
        session_id: Uuid,
        role: ChatMessageRole,
        content: &str,
    ) -> Result<ChatMessage, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (session_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, session_id, role, content, created_at
            "#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE chat_sessions SET updated_at = NOW() WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(serde_json::to_string(&ChatMessageRole::Assistant).unwrap(), "\"ASSISTANT\"");
        let role: ChatMessageRole = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(role, ChatMessageRole::User);
    }

    #[test]
    fn test_unknown_message_role_rejected() {
        assert!(serde_json::from_str::<ChatMessageRole>("\"TOOL\"").is_err());
    }
}
