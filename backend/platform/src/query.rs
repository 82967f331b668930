//! Row filters and ordering, expressed the way the platform's REST layer
//! (PostgREST) spells them so the same [`Query`] drives both the HTTP client
//! and the in-memory store.

use std::fmt::Display;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String),
    In(Vec<String>),
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub condition: Condition,
}

impl Filter {
    pub fn eq(column: &str, value: impl Display) -> Self {
        Self {
            column: column.to_string(),
            condition: Condition::Eq(value.to_string()),
        }
    }

    pub fn is_in<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        Self {
            column: column.to_string(),
            condition: Condition::In(values.into_iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Self {
            column: column.to_string(),
            condition: Condition::IsNull,
        }
    }

    /// `(column, "op.value")` pair for a PostgREST query string.
    pub fn to_param(&self) -> (String, String) {
        let rendered = match &self.condition {
            Condition::Eq(value) => format!("eq.{value}"),
            Condition::IsNull => "is.null".to_string(),
            Condition::In(values) => {
                let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
                format!("in.({})", quoted.join(","))
            }
        };

        (self.column.clone(), rendered)
    }

    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(&self.column).and_then(render);

        match (&self.condition, cell) {
            (Condition::IsNull, cell) => cell.is_none(),
            (Condition::Eq(expected), Some(actual)) => *expected == actual,
            (Condition::In(values), Some(actual)) => values.contains(&actual),
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(self.filters.iter().map(Filter::to_param));

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

/// Text form of a cell as PostgREST compares it. Null renders as `None`.
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_params() {
        let query = Query::new()
            .eq("status", "pending")
            .filter(Filter::is_in("id", ["a", "b,c"]))
            .filter(Filter::is_null("service_type"))
            .order("sort_order", true)
            .order("created_at", false)
            .limit(1);

        assert_eq!(
            query.params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("status".to_string(), "eq.pending".to_string()),
                ("id".to_string(), "in.(\"a\",\"b,c\")".to_string()),
                ("service_type".to_string(), "is.null".to_string()),
                ("order".to_string(), "sort_order.asc,created_at.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_matches() {
        let row = json!({ "used": false, "count": 3, "service_type": null, "id": "x" });

        assert!(Filter::eq("used", false).matches(&row));
        assert!(Filter::eq("count", 3).matches(&row));
        assert!(Filter::is_null("service_type").matches(&row));
        assert!(Filter::is_null("missing").matches(&row));
        assert!(Filter::is_in("id", ["y", "x"]).matches(&row));
        assert!(!Filter::eq("service_type", "null").matches(&row));
        assert!(!Filter::eq("used", true).matches(&row));
    }
}
