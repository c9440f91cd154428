// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chart metadata CRUD. The engine never reads these; they exist for the
//! dashboard layer that shares this store.

use crate::{Store, StoreError};
use foreman_core::Chart;
use rusqlite::Row;

fn chart_from_row(row: &Row<'_>) -> rusqlite::Result<Chart> {
    let config_json: String = row.get("config")?;
    Ok(Chart {
        id: row.get("id")?,
        name: row.get("name")?,
        chart_type: row.get("type")?,
        formula: row.get("formula")?,
        config: serde_json::from_str(&config_json).unwrap_or(serde_json::Value::Null),
        created_at: row.get("created_at")?,
    })
}

impl Store {
    pub fn insert_chart(&self, chart: &Chart) -> Result<(), StoreError> {
        let config = serde_json::to_string(&chart.config)?;
        self.with(|conn| {
            conn.execute(
                "INSERT INTO charts (id, name, type, formula, config, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    chart.id,
                    chart.name,
                    chart.chart_type,
                    chart.formula,
                    config,
                    chart.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_chart(&self, id: &str) -> Result<Option<Chart>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM charts WHERE id = ?1")?;
            let mut rows = stmt.query_map([id], chart_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
    }

    pub fn list_charts(&self) -> Result<Vec<Chart>, StoreError> {
        self.with(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM charts ORDER BY rowid")?;
            let rows = stmt.query_map([], chart_from_row)?;
            let mut charts = Vec::new();
            for row in rows {
                charts.push(row?);
            }
            Ok(charts)
        })
    }

    pub fn update_chart(&self, chart: &Chart) -> Result<bool, StoreError> {
        let config = serde_json::to_string(&chart.config)?;
        self.with(|conn| {
            let changed = conn.execute(
                "UPDATE charts SET name = ?2, type = ?3, formula = ?4, config = ?5 WHERE id = ?1",
                rusqlite::params![chart.id, chart.name, chart.chart_type, chart.formula, config],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_chart(&self, id: &str) -> Result<bool, StoreError> {
        self.with(|conn| {
            let changed = conn.execute("DELETE FROM charts WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
#[path = "charts_tests.rs"]
mod tests;
