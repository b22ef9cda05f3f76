//! Query-string filters for the recipe list endpoint.
//!
//! `RecipeQuery` mirrors the supported parameters (`author`, repeated
//! `tags` slugs, `is_favorited`, `is_in_shopping_cart`) and compiles them
//! into a SQL WHERE fragment with positional parameters.

use rusqlite::types::Value;

/// Parsed recipe list filters. The boolean flags are scoped to the
/// requesting viewer; for anonymous viewers they can never match.
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub author: Option<i64>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    /// Compile to `(" WHERE ...", params)` against the `recipes` table,
    /// or `("", [])` when no filter applies. Tag slugs match ANY of the
    /// given tags.
    pub fn to_sql(&self, viewer: Option<i64>) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(author) = self.author {
            clauses.push("author_id = ?".to_string());
            params.push(Value::from(author));
        }

        if !self.tags.is_empty() {
            let placeholders = vec!["?"; self.tags.len()].join(", ");
            clauses.push(format!(
                "id IN (SELECT rt.recipe_id FROM recipe_tags rt
                        JOIN tags t ON t.id = rt.tag_id WHERE t.slug IN ({}))",
                placeholders
            ));
            for slug in &self.tags {
                params.push(Value::from(slug.clone()));
            }
        }

        if self.is_favorited {
            match viewer {
                Some(user_id) => {
                    clauses.push("id IN (SELECT recipe_id FROM favorites WHERE user_id = ?)".into());
                    params.push(Value::from(user_id));
                }
                None => clauses.push("0 = 1".into()),
            }
        }

        if self.is_in_shopping_cart {
            match viewer {
                Some(user_id) => {
                    clauses
                        .push("id IN (SELECT recipe_id FROM shopping_cart WHERE user_id = ?)".into());
                    params.push(Value::from(user_id));
                }
                None => clauses.push("0 = 1".into()),
            }
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

/// Interpret a query-string flag the way the original API does: `1` and
/// `true` switch the filter on, anything else leaves it off.
pub fn flag_is_set(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true") | Some("True"))
}

/// Split a raw query string into decoded key/value pairs. Needed because
/// the `tags` parameter repeats, which plain struct deserialization of
/// the query cannot express.
pub fn parse_query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key), percent_decode(value)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse the recipe list query string into filters plus pagination.
pub fn parse_recipe_query(query: Option<&str>) -> (RecipeQuery, crate::pagination::PageParams) {
    let mut filters = RecipeQuery::default();
    let mut page = crate::pagination::PageParams::default();
    for (key, value) in parse_query_pairs(query) {
        match key.as_str() {
            "author" => filters.author = value.parse().ok(),
            "tags" => {
                if !value.is_empty() {
                    filters.tags.push(value);
                }
            }
            "is_favorited" => filters.is_favorited = flag_is_set(Some(value.as_str())),
            "is_in_shopping_cart" => {
                filters.is_in_shopping_cart = flag_is_set(Some(value.as_str()))
            }
            "page" => page.page = value.parse().ok(),
            "limit" => page.limit = value.parse().ok(),
            _ => {}
        }
    }
    (filters, page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_produces_no_where_clause() {
        let (sql, params) = RecipeQuery::default().to_sql(None);
        assert_eq!(sql, "");
        assert!(params.is_empty());
    }

    #[test]
    fn author_filter_binds_one_param() {
        let query = RecipeQuery { author: Some(7), ..Default::default() };
        let (sql, params) = query.to_sql(None);
        assert!(sql.starts_with(" WHERE "));
        assert!(sql.contains("author_id = ?"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn tag_filter_binds_one_param_per_slug() {
        let query = RecipeQuery {
            tags: vec!["dinner".into(), "lunch".into()],
            ..Default::default()
        };
        let (sql, params) = query.to_sql(None);
        assert!(sql.contains("t.slug IN (?, ?)"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn favorited_filter_is_viewer_scoped() {
        let query = RecipeQuery { is_favorited: true, ..Default::default() };

        let (sql, params) = query.to_sql(Some(3));
        assert!(sql.contains("FROM favorites"));
        assert_eq!(params.len(), 1);

        let (sql, params) = query.to_sql(None);
        assert!(sql.contains("0 = 1"), "anonymous viewer matches nothing");
        assert!(params.is_empty());
    }

    #[test]
    fn all_filters_compose_with_and() {
        let query = RecipeQuery {
            author: Some(1),
            tags: vec!["dinner".into()],
            is_favorited: true,
            is_in_shopping_cart: true,
        };
        let (sql, params) = query.to_sql(Some(2));
        assert_eq!(sql.matches(" AND ").count(), 3);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn parse_collects_repeated_tags_and_pagination() {
        let (filters, page) =
            parse_recipe_query(Some("tags=dinner&tags=lunch&author=3&page=2&limit=12"));
        assert_eq!(filters.tags, vec!["dinner", "lunch"]);
        assert_eq!(filters.author, Some(3));
        assert!(!filters.is_favorited);
        assert_eq!(page.page, Some(2));
        assert_eq!(page.limit, Some(12));
    }

    #[test]
    fn parse_handles_flags_and_empty_query() {
        let (filters, page) = parse_recipe_query(Some("is_favorited=1&is_in_shopping_cart=true"));
        assert!(filters.is_favorited);
        assert!(filters.is_in_shopping_cart);

        let (filters, page_empty) = parse_recipe_query(None);
        assert!(filters.tags.is_empty());
        assert!(page_empty.page.is_none());
        let _ = page;
    }

    #[test]
    fn parse_percent_decodes_values() {
        let pairs = parse_query_pairs(Some("name=%D0%BC%D1%83%D0%BA%D0%B0&x=a+b"));
        assert_eq!(pairs[0], ("name".to_string(), "мука".to_string()));
        assert_eq!(pairs[1], ("x".to_string(), "a b".to_string()));
    }

    #[test]
    fn parse_ignores_malformed_numbers() {
        let (filters, page) = parse_recipe_query(Some("author=abc&page=xyz"));
        assert!(filters.author.is_none());
        assert!(page.page.is_none());
    }

    #[test]
    fn flag_parsing_accepts_one_and_true() {
        assert!(flag_is_set(Some("1")));
        assert!(flag_is_set(Some("true")));
        assert!(flag_is_set(Some("True")));
        assert!(!flag_is_set(Some("0")));
        assert!(!flag_is_set(Some("yes")));
        assert!(!flag_is_set(None));
    }
}
