//! Reference lists (assets, sessions, setups). One generic implementation
//! keyed by [`ReferenceKind`]; the three categories behave identically.

use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, AppResult, ValidationIssue};
use crate::models::{ReferenceItem, ReferenceKind};

use super::{lock_conn, Scope};

pub fn list_items(db: &Database, scope: &Scope, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>> {
    let conn = lock_conn(db)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name FROM {} WHERE user_id = ?1 AND journal_id = ?2 ORDER BY name COLLATE NOCASE",
        kind.table()
    ))?;
    let rows = stmt.query_map([&scope.user_id, &scope.journal_id], |row| {
        Ok(ReferenceItem {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Add a named item. Duplicate names within the same journal are rejected
/// case-insensitively.
pub fn add_item(
    db: &Database,
    scope: &Scope,
    kind: ReferenceKind,
    name: &str,
) -> AppResult<ReferenceItem> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation(vec![ValidationIssue::new(
            "name",
            "Name is required",
        )]));
    }

    let conn = lock_conn(db)?;
    let exists: bool = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND journal_id = ?2 AND name = ?3 COLLATE NOCASE)",
            kind.table()
        ),
        rusqlite::params![scope.user_id, scope.journal_id, name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(AppError::Duplicate {
            name: name.to_string(),
        });
    }

    let item = ReferenceItem {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
    };
    conn.execute(
        &format!(
            "INSERT INTO {} (id, user_id, journal_id, name) VALUES (?1, ?2, ?3, ?4)",
            kind.table()
        ),
        rusqlite::params![item.id, scope.user_id, scope.journal_id, item.name],
    )?;
    Ok(item)
}

/// Delete an item, refusing while any trade still points at it.
pub fn delete_item(db: &Database, scope: &Scope, kind: ReferenceKind, id: &str) -> AppResult<()> {
    let conn = lock_conn(db)?;

    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM trades WHERE user_id = ?1 AND journal_id = ?2 AND {} = ?3",
            kind.trade_column()
        ),
        rusqlite::params![scope.user_id, scope.journal_id, id],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Err(AppError::ReferencedByTrades {
            label: kind.label(),
            count,
        });
    }

    let deleted = conn.execute(
        &format!(
            "DELETE FROM {} WHERE id = ?1 AND user_id = ?2 AND journal_id = ?3",
            kind.table()
        ),
        rusqlite::params![id, scope.user_id, scope.journal_id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound { entity: "Record" });
    }
    Ok(())
}

/// Find an item by name, ignoring case. Used by the spreadsheet importer.
pub fn find_by_name(
    db: &Database,
    scope: &Scope,
    kind: ReferenceKind,
    name: &str,
) -> AppResult<Option<ReferenceItem>> {
    let conn = lock_conn(db)?;
    match conn.query_row(
        &format!(
            "SELECT id, name FROM {} WHERE user_id = ?1 AND journal_id = ?2 AND name = ?3 COLLATE NOCASE",
            kind.table()
        ),
        rusqlite::params![scope.user_id, scope.journal_id, name.trim()],
        |row| {
            Ok(ReferenceItem {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    ) {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::auth::sign_up;
    use crate::actions::journals::create_journal;
    use crate::actions::trades::add_trade;
    use crate::models::{CreateJournalInput, CreateTradeInput, SignUpInput};

    fn setup() -> (Database, Scope) {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = sign_up(
            &db,
            &SignUpInput {
                email: "owner@example.com".into(),
                password: "hunter2hunter2".into(),
            },
        )
        .unwrap();
        let journal = create_journal(
            &db,
            &user.id,
            &CreateJournalInput {
                name: "Main".into(),
                description: None,
            },
        )
        .unwrap();
        let scope = Scope::new(user.id, journal.id);
        (db, scope)
    }

    #[test]
    fn add_and_list_sorted_by_name() {
        let (db, scope) = setup();
        add_item(&db, &scope, ReferenceKind::Asset, "gbpusd").unwrap();
        add_item(&db, &scope, ReferenceKind::Asset, "EURUSD").unwrap();

        let items = list_items(&db, &scope, ReferenceKind::Asset).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["EURUSD", "gbpusd"]);
    }

    #[test]
    fn duplicate_name_is_case_insensitive() {
        let (db, scope) = setup();
        add_item(&db, &scope, ReferenceKind::Setup, "Breakout").unwrap();

        let err = add_item(&db, &scope, ReferenceKind::Setup, "  breakout ").unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn same_name_allowed_across_kinds_and_journals() {
        let (db, scope) = setup();
        add_item(&db, &scope, ReferenceKind::Asset, "London").unwrap();
        add_item(&db, &scope, ReferenceKind::Session, "London").unwrap();

        let other_journal = create_journal(
            &db,
            &scope.user_id,
            &CreateJournalInput {
                name: "Second".into(),
                description: None,
            },
        )
        .unwrap();
        let other_scope = Scope::new(scope.user_id.clone(), other_journal.id);
        add_item(&db, &other_scope, ReferenceKind::Asset, "London").unwrap();
    }

    #[test]
    fn delete_refuses_while_referenced() {
        let (db, scope) = setup();
        let asset = add_item(&db, &scope, ReferenceKind::Asset, "EURUSD").unwrap();

        add_trade(
            &db,
            &scope,
            &CreateTradeInput {
                trade_date: "2024-04-01".into(),
                asset_id: Some(asset.id.clone()),
                risk_input: "1%".into(),
                profit_loss_amount: 1.0,
                ..Default::default()
            },
        )
        .unwrap();

        let err = delete_item(&db, &scope, ReferenceKind::Asset, &asset.id).unwrap_err();
        match err {
            AppError::ReferencedByTrades { label, count } => {
                assert_eq!(label, "asset");
                assert_eq!(count, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn delete_unreferenced_item_succeeds() {
        let (db, scope) = setup();
        let setup_item = add_item(&db, &scope, ReferenceKind::Setup, "Reversal").unwrap();
        delete_item(&db, &scope, ReferenceKind::Setup, &setup_item.id).unwrap();
        assert!(list_items(&db, &scope, ReferenceKind::Setup).unwrap().is_empty());
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let (db, scope) = setup();
        assert!(matches!(
            delete_item(&db, &scope, ReferenceKind::Session, "missing"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn find_by_name_ignores_case() {
        let (db, scope) = setup();
        let item = add_item(&db, &scope, ReferenceKind::Session, "London").unwrap();
        let found = find_by_name(&db, &scope, ReferenceKind::Session, "LONDON")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, item.id);
        assert!(find_by_name(&db, &scope, ReferenceKind::Session, "Tokyo")
            .unwrap()
            .is_none());
    }
}
