//! Product category operations.

use rusqlite::OptionalExtension;

use super::{Database, DbResult};
use crate::models::ProductCategory;

impl Database {
    /// Insert a category, returning it with its assigned id.
    pub fn insert_category(&self, name: &str) -> DbResult<ProductCategory> {
        self.conn
            .execute("INSERT INTO product_categories (name) VALUES (?)", [name])?;
        Ok(ProductCategory {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn get_category(&self, id: i64) -> DbResult<Option<ProductCategory>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name FROM product_categories WHERE id = ?",
                [id],
                |row| {
                    Ok(ProductCategory {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    pub fn find_category_by_name(&self, name: &str) -> DbResult<Option<ProductCategory>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name FROM product_categories WHERE name = ?",
                [name],
                |row| {
                    Ok(ProductCategory {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    /// All categories ordered by name.
    pub fn list_categories(&self) -> DbResult<Vec<ProductCategory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM product_categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductCategory {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();
        let b = db.insert_category("Antibiotics").unwrap();
        db.insert_category("Analgesics").unwrap();

        let names: Vec<_> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Analgesics", "Antibiotics"]);
        assert_eq!(db.get_category(b.id).unwrap(), Some(b));
    }

    #[test]
    fn test_names_unique() {
        let db = Database::open_in_memory().unwrap();
        db.insert_category("Syrups").unwrap();
        assert!(db.insert_category("Syrups").is_err());
        assert!(db.find_category_by_name("Syrups").unwrap().is_some());
    }
}
