use rusqlite::types::Value;

/// Assembles one parameterized SELECT from fragments.
///
/// Every fragment carries its own bound values; they are emitted in the same
/// order as the placeholders appear in the final text (select list, joins,
/// where clause). Nothing user-supplied is ever formatted into the SQL.
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    from: String,
    columns: Vec<String>,
    select_params: Vec<Value>,
    joins: Vec<String>,
    join_params: Vec<Value>,
    conditions: Vec<String>,
    where_params: Vec<Value>,
    group_by: Vec<String>,
}

impl QueryBuilder {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            from: table.into(),
            ..Default::default()
        }
    }

    pub fn select(&mut self, column: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.columns.push(column.into());
        self.select_params.extend(params);
        self
    }

    pub fn join(&mut self, clause: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.joins.push(format!("JOIN {}", clause.into()));
        self.join_params.extend(params);
        self
    }

    pub fn left_join(&mut self, clause: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.joins.push(format!("LEFT JOIN {}", clause.into()));
        self.join_params.extend(params);
        self
    }

    /// Adds a condition; conditions are ANDed together.
    pub fn filter(&mut self, condition: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.conditions.push(condition.into());
        self.where_params.extend(params);
        self
    }

    pub fn group_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.group_by.push(column.into());
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.from);
        for j in &self.joins {
            sql.push(' ');
            sql.push_str(j);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        let mut params = Vec::with_capacity(
            self.select_params.len() + self.join_params.len() + self.where_params.len(),
        );
        params.extend(self.select_params.iter().cloned());
        params.extend(self.join_params.iter().cloned());
        params.extend(self.where_params.iter().cloned());
        (sql, params)
    }
}

/// `?, ?, ?` with one placeholder per value.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_follow_placeholder_order() {
        let mut q = QueryBuilder::from("builds b");
        q.filter("b.timestamp >= ?", vec![Value::Integer(5)])
            .join("jobs j ON j.id = b.job_id", vec![])
            .select("SUM(? <= b.timestamp)", vec![Value::Integer(1)])
            .left_join(
                "jobs_sippy_tags x ON x.job_id = j.id AND x.tag = ?",
                vec![Value::Text("fips".into())],
            )
            .select("b.status", vec![])
            .group_by("b.status");

        let (sql, params) = q.build();
        assert_eq!(
            sql,
            "SELECT SUM(? <= b.timestamp), b.status FROM builds b \
             JOIN jobs j ON j.id = b.job_id \
             LEFT JOIN jobs_sippy_tags x ON x.job_id = j.id AND x.tag = ? \
             WHERE b.timestamp >= ? GROUP BY b.status"
        );
        assert_eq!(
            params,
            vec![
                Value::Integer(1),
                Value::Text("fips".into()),
                Value::Integer(5)
            ]
        );
        assert_eq!(q.column_count(), 2);
    }

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(1), "?");
    }
}
