use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::models::{User, UserDraft};

use super::{map_unique_constraint, page_bounds, search_pattern};

const USER_COLUMNS: &str = "id, name, email, phone, membership_type, status";

fn conversion_error(column: usize, err: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, err.into())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let membership: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        membership_type: membership.parse().map_err(|err| conversion_error(4, err))?,
        status: status.parse().map_err(|err| conversion_error(5, err))?,
    })
}

fn collect_users(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StoreResult<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params, user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Insert a roster entry. A clashing email surfaces as a duplicate on the
/// `email` field.
pub fn insert_user(conn: &Connection, draft: &UserDraft) -> StoreResult<User> {
    conn.execute(
        "INSERT INTO users (name, email, phone, membership_type, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            draft.name,
            draft.email,
            draft.phone,
            draft.membership_type.as_str(),
            draft.status.as_str(),
        ],
    )
    .map_err(map_unique_constraint)?;

    let id = conn.last_insert_rowid();
    info!(id, "inserted user");
    Ok(User {
        id,
        name: draft.name.clone(),
        email: draft.email.clone(),
        phone: draft.phone.clone(),
        membership_type: draft.membership_type,
        status: draft.status,
    })
}

pub fn update_user(conn: &Connection, id: i64, draft: &UserDraft) -> StoreResult<()> {
    let updated = conn
        .execute(
            "UPDATE users SET name = ?1, email = ?2, phone = ?3, membership_type = ?4, status = ?5
             WHERE id = ?6",
            params![
                draft.name,
                draft.email,
                draft.phone,
                draft.membership_type.as_str(),
                draft.status.as_str(),
                id,
            ],
        )
        .map_err(map_unique_constraint)?;

    if updated == 0 {
        return Err(StoreError::NotFound { entity: "User", id });
    }
    info!(id, "updated user");
    Ok(())
}

pub fn delete_user(conn: &Connection, id: i64) -> StoreResult<()> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(StoreError::NotFound { entity: "User", id });
    }
    info!(id, "deleted user");
    Ok(())
}

pub fn fetch_user(conn: &Connection, id: i64) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

pub fn count_users(conn: &Connection) -> StoreResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn fetch_users_page(
    conn: &Connection,
    page: usize,
    page_size: usize,
) -> StoreResult<Vec<User>> {
    let Some((limit, offset)) = page_bounds(page, page_size) else {
        return Ok(Vec::new());
    };
    debug!(page, page_size, "loading user page");
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ?1 OFFSET ?2");
    collect_users(conn, &sql, params![limit, offset])
}

pub fn fetch_all_users(conn: &Connection) -> StoreResult<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
    collect_users(conn, &sql, [])
}

/// Same contract as `search_books`, over name, email and phone.
pub fn search_users(conn: &Connection, term: &str, exact: bool) -> StoreResult<Vec<User>> {
    let Some(needle) = search_pattern(term) else {
        return fetch_all_users(conn);
    };
    debug!(term = %needle, exact, "searching users");

    let predicate = if exact {
        "LOWER(name) = ?1 OR LOWER(email) = ?1 OR LOWER(phone) = ?1"
    } else {
        "instr(LOWER(name), ?1) > 0
         OR instr(LOWER(email), ?1) > 0
         OR instr(LOWER(phone), ?1) > 0"
    };
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate} ORDER BY id");
    collect_users(conn, &sql, params![needle])
}
