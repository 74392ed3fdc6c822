//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from the resolved model.

use crate::config::{AutoTimestamp, ColumnInfo, ColumnType, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::label::hidden_column;
use crate::sql::PgBindValue;
use std::collections::HashMap;

/// Alias of the entity being queried; joined tables get t1, t2, ...
pub const MAIN_ALIAS: &str = "t0";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

fn placeholder(n: u32, ty: &ColumnType) -> String {
    format!("${}::{}", n, ty.pg_cast())
}

/// Numeric goes out as text so decimals keep their exact digits.
fn display_expr(expr: &str, col: &ColumnInfo) -> String {
    match col.ty {
        ColumnType::Numeric { .. } => format!("{}::text", expr),
        _ => expr.to_string(),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }
}

/// LEFT JOINs collected while resolving `__` lookups. One join per (alias, relationship field).
pub struct JoinPlan<'m> {
    model: &'m ResolvedModel,
    joins: Vec<String>,
    alias_of: HashMap<(String, String), String>,
}

impl<'m> JoinPlan<'m> {
    pub fn new(model: &'m ResolvedModel) -> Self {
        JoinPlan {
            model,
            joins: Vec::new(),
            alias_of: HashMap::new(),
        }
    }

    /// Alias of `target` joined through `fk` on `from_alias`.
    pub fn join(&mut self, from_alias: &str, fk: &ColumnInfo, target: &ResolvedEntity) -> String {
        let key = (from_alias.to_string(), fk.field.clone());
        if let Some(alias) = self.alias_of.get(&key) {
            return alias.clone();
        }
        let alias = format!("t{}", self.alias_of.len() + 1);
        self.joins.push(format!(
            " LEFT JOIN {} {} ON {}.{} = {}.{}",
            qualified_table(&target.schema_name, &target.table_name),
            alias,
            alias,
            quoted(&target.pk().column),
            from_alias,
            quoted(&fk.column)
        ));
        self.alias_of.insert(key, alias.clone());
        alias
    }

    /// Column expression for `path` on `entity` (reachable as `alias`), joining as needed.
    pub fn column_expr(
        &mut self,
        alias: &str,
        entity: &'m ResolvedEntity,
        path: &str,
    ) -> Result<(String, &'m ColumnInfo), AppError> {
        let lookup = self.model.resolve_lookup(entity, path)?;
        let mut current = alias.to_string();
        for (fk, target) in &lookup.hops {
            current = self.join(&current, fk, target);
        }
        Ok((format!("{}.{}", current, quoted(&lookup.column.column)), lookup.column))
    }

    /// Hidden text columns feeding `entity`'s label, aliased `__label__{prefix}{path}`.
    pub fn label_columns(
        &mut self,
        alias: &str,
        entity: &'m ResolvedEntity,
        prefix: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut out = Vec::new();
        for path in entity.label.paths() {
            let (expr, _) = self.column_expr(alias, entity, path)?;
            out.push(format!("{}::text AS {}", expr, quoted(&hidden_column(prefix, path))));
        }
        Ok(out)
    }

    pub fn sql(&self) -> String {
        self.joins.concat()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: PgBindValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Changelist request after parsing: search terms, filters, ordering, and page window.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub search_terms: Vec<String>,
    pub filters: Vec<Filter>,
    pub ordering: Vec<OrderBy>,
    pub limit: u32,
    pub offset: u32,
}

/// Case-insensitive substring pattern with LIKE wildcards in the term escaped.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Changelist page and matching COUNT(*). Both share the WHERE clause and its parameters.
pub fn select_changelist(
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    query: &ListQuery,
) -> Result<(QueryBuf, QueryBuf), AppError> {
    let mut plan = JoinPlan::new(model);
    let mut params = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let pk = entity.pk();

    let mut select_parts = vec![format!("{}.{} AS {}", MAIN_ALIAS, quoted(&pk.column), quoted(&pk.field))];
    for field in &entity.admin.list_display {
        if *field == pk.field {
            continue;
        }
        let col = entity
            .column(field)
            .ok_or_else(|| AppError::BadRequest(format!("unknown field {}", field)))?;
        let expr = format!("{}.{}", MAIN_ALIAS, quoted(&col.column));
        select_parts.push(format!("{} AS {}", display_expr(&expr, col), quoted(&col.field)));
        if let Some(rel) = &col.relation {
            let target = model
                .entity_by_path(&rel.target)
                .ok_or_else(|| AppError::NotFound(rel.target.clone()))?;
            let alias = plan.join(MAIN_ALIAS, col, target);
            let prefix = format!("{}__", col.field);
            select_parts.extend(plan.label_columns(&alias, target, &prefix)?);
        }
    }
    for part in plan.label_columns(MAIN_ALIAS, entity, "")? {
        if !select_parts.contains(&part) {
            select_parts.push(part);
        }
    }

    let mut where_parts = Vec::new();
    for f in &query.filters {
        let col = entity
            .column(&f.field)
            .ok_or_else(|| AppError::BadRequest(format!("unknown field {}", f.field)))?;
        let n = params.push_param(f.value.clone());
        where_parts.push(format!(
            "{}.{} {} {}",
            MAIN_ALIAS,
            quoted(&col.column),
            f.op.as_sql(),
            placeholder(n, &col.ty)
        ));
    }
    if !entity.admin.search_fields.is_empty() {
        for term in &query.search_terms {
            let n = params.push_param(PgBindValue::text(like_pattern(term)));
            let mut ors = Vec::new();
            for path in &entity.admin.search_fields {
                let (expr, _) = plan.column_expr(MAIN_ALIAS, entity, path)?;
                ors.push(format!("{}::text ILIKE ${}", expr, n));
            }
            where_parts.push(format!("({})", ors.join(" OR ")));
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let mut order_parts = Vec::new();
    for o in &query.ordering {
        let col = entity
            .column(&o.field)
            .ok_or_else(|| AppError::BadRequest(format!("unknown field {}", o.field)))?;
        if col.is_pk {
            continue;
        }
        order_parts.push(format!(
            "{}.{} {}",
            MAIN_ALIAS,
            quoted(&col.column),
            if o.descending { "DESC" } else { "ASC" }
        ));
    }
    let pk_descending = query
        .ordering
        .iter()
        .find(|o| o.field == pk.field)
        .map(|o| o.descending)
        .unwrap_or(true);
    order_parts.push(format!(
        "{}.{} {}",
        MAIN_ALIAS,
        quoted(&pk.column),
        if pk_descending { "DESC" } else { "ASC" }
    ));

    let joins = plan.sql();
    let page = QueryBuf {
        sql: format!(
            "SELECT {} FROM {} {}{}{} ORDER BY {} LIMIT {} OFFSET {}",
            select_parts.join(", "),
            table,
            MAIN_ALIAS,
            joins,
            where_clause,
            order_parts.join(", "),
            query.limit.min(1000),
            query.offset
        ),
        params: params.params.clone(),
    };
    let count = QueryBuf {
        sql: format!(
            "SELECT COUNT(*) AS \"total\" FROM {} {}{}{}",
            table, MAIN_ALIAS, joins, where_clause
        ),
        params: params.params,
    };
    Ok((page, count))
}

/// SELECT every field plus label inputs by primary key; the id is bound as $1.
pub fn select_by_id(model: &ResolvedModel, entity: &ResolvedEntity, id: i64) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut plan = JoinPlan::new(model);
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let pk = entity.pk();
    let mut select_parts: Vec<String> = entity
        .columns
        .iter()
        .map(|c| {
            let expr = format!("{}.{}", MAIN_ALIAS, quoted(&c.column));
            format!("{} AS {}", display_expr(&expr, c), quoted(&c.field))
        })
        .collect();
    select_parts.extend(plan.label_columns(MAIN_ALIAS, entity, "")?);
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "SELECT {} FROM {} {}{} WHERE {}.{} = {}",
        select_parts.join(", "),
        table,
        MAIN_ALIAS,
        plan.sql(),
        MAIN_ALIAS,
        quoted(&pk.column),
        placeholder(n, &pk.ty)
    );
    Ok(q)
}

fn returning_pk(entity: &ResolvedEntity) -> String {
    let pk = entity.pk();
    format!("RETURNING {} AS {}", quoted(&pk.column), quoted(&pk.field))
}

/// INSERT cleaned values. Auto timestamps not supplied are set to NOW().
pub fn insert(entity: &ResolvedEntity, values: &[(&ColumnInfo, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (col, value) in values {
        let n = q.push_param(value.clone());
        cols.push(quoted(&col.column));
        placeholders.push(placeholder(n, &col.ty));
    }
    for col in entity.columns.iter().filter(|c| c.auto.is_some()) {
        if values.iter().any(|(c, _)| c.field == col.field) {
            continue;
        }
        cols.push(quoted(&col.column));
        placeholders.push("NOW()".to_string());
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES {}", table, returning_pk(entity))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning_pk(entity)
        )
    };
    q
}

/// UPDATE by id: SET only the cleaned values, plus NOW() for on-update timestamps.
pub fn update(entity: &ResolvedEntity, id: i64, values: &[(&ColumnInfo, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let pk = entity.pk();
    let mut sets = Vec::new();
    for (col, value) in values {
        let n = q.push_param(value.clone());
        sets.push(format!("{} = {}", quoted(&col.column), placeholder(n, &col.ty)));
    }
    for col in entity.columns.iter().filter(|c| c.auto == Some(AutoTimestamp::OnUpdate)) {
        sets.push(format!("{} = NOW()", quoted(&col.column)));
    }
    let id_param = q.push_param(PgBindValue::I64(id));
    if sets.is_empty() {
        q.sql = format!(
            "SELECT {} AS {} FROM {} WHERE {} = {}",
            quoted(&pk.column),
            quoted(&pk.field),
            table,
            quoted(&pk.column),
            placeholder(id_param, &pk.ty)
        );
        return q;
    }
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} {}",
        table,
        sets.join(", "),
        quoted(&pk.column),
        placeholder(id_param, &pk.ty),
        returning_pk(entity)
    );
    q
}

/// DELETE by id. No cascading: referencing rows are the database's concern.
pub fn delete(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let pk = entity.pk();
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} {}",
        table,
        quoted(&pk.column),
        placeholder(n, &pk.ty),
        returning_pk(entity)
    );
    q
}

/// Rows of `target` with their label inputs, for relationship filter choices.
pub fn select_relation_choices(model: &ResolvedModel, target: &ResolvedEntity) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut plan = JoinPlan::new(model);
    let pk = target.pk();
    let mut select_parts = vec![format!("{}.{} AS {}", MAIN_ALIAS, quoted(&pk.column), quoted(&pk.field))];
    select_parts.extend(plan.label_columns(MAIN_ALIAS, target, "")?);
    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}.{}",
        select_parts.join(", "),
        qualified_table(&target.schema_name, &target.table_name),
        MAIN_ALIAS,
        plan.sql(),
        MAIN_ALIAS,
        quoted(&pk.column)
    );
    Ok(q)
}

/// Distinct stored values of one column, for plain-field filter choices.
pub fn select_distinct_values(entity: &ResolvedEntity, col: &ColumnInfo) -> QueryBuf {
    let mut q = QueryBuf::new();
    let expr = format!("{}.{}", MAIN_ALIAS, quoted(&col.column));
    q.sql = format!(
        "SELECT DISTINCT {} AS \"value\" FROM {} {} WHERE {} IS NOT NULL ORDER BY 1",
        display_expr(&expr, col),
        qualified_table(&entity.schema_name, &entity.table_name),
        MAIN_ALIAS,
        expr
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn model() -> ResolvedModel {
        catalog::resolved_catalog().unwrap()
    }

    fn page_query(limit: u32) -> ListQuery {
        ListQuery {
            limit,
            ..ListQuery::default()
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("sala"), "%sala%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn space_type_changelist_selects_listed_columns() {
        let model = model();
        let entity = model.entity_by_path("space_types").unwrap();
        let (page, count) = select_changelist(&model, entity, &page_query(100)).unwrap();
        assert_eq!(
            page.sql,
            "SELECT t0.\"id\" AS \"id\", t0.\"nombre\" AS \"name\", t0.\"activo\" AS \"active\", \
             t0.\"fecha_creacion\" AS \"created_at\", t0.\"nombre\"::text AS \"__label__name\" \
             FROM \"public\".\"tipos_espacios\" t0 ORDER BY t0.\"id\" DESC LIMIT 100 OFFSET 0"
        );
        assert_eq!(count.sql, "SELECT COUNT(*) AS \"total\" FROM \"public\".\"tipos_espacios\" t0");
        assert!(page.params.is_empty());
    }

    #[test]
    fn active_filter_and_search_share_parameters_with_count() {
        let model = model();
        let entity = model.entity_by_path("space_types").unwrap();
        let query = ListQuery {
            search_terms: vec!["Sala".into()],
            filters: vec![Filter {
                field: "active".into(),
                op: FilterOp::Eq,
                value: PgBindValue::Bool(true),
            }],
            limit: 20,
            ..ListQuery::default()
        };
        let (page, count) = select_changelist(&model, entity, &query).unwrap();
        let expected_where = " WHERE t0.\"activo\" = $1::boolean AND (t0.\"nombre\"::text ILIKE $2)";
        assert!(page.sql.contains(expected_where), "{}", page.sql);
        assert!(count.sql.ends_with(expected_where), "{}", count.sql);
        assert_eq!(page.params, vec![PgBindValue::Bool(true), PgBindValue::text("%Sala%")]);
        assert_eq!(page.params, count.params);
    }

    #[test]
    fn reservation_search_joins_users_and_spaces() {
        let model = model();
        let entity = model.entity_by_path("reservations").unwrap();
        let query = ListQuery {
            search_terms: vec!["room".into()],
            limit: 100,
            ..ListQuery::default()
        };
        let (page, _) = select_changelist(&model, entity, &query).unwrap();
        assert!(page
            .sql
            .contains(" LEFT JOIN \"public\".\"usuarios\" t1 ON t1.\"id\" = t0.\"usuario_id\""));
        assert!(page
            .sql
            .contains(" LEFT JOIN \"public\".\"espacios\" t2 ON t2.\"id\" = t0.\"espacio_id\""));
        assert!(page
            .sql
            .contains("(t1.\"email\"::text ILIKE $1 OR t2.\"nombre\"::text ILIKE $1)"));
        // each relationship is joined once even though labels and search both use it
        assert_eq!(page.sql.matches("LEFT JOIN").count(), 2);
    }

    #[test]
    fn reservation_changelist_carries_related_labels() {
        let model = model();
        let entity = model.entity_by_path("reservations").unwrap();
        let (page, _) = select_changelist(&model, entity, &page_query(100)).unwrap();
        for hidden in [
            "t1.\"email\"::text AS \"__label__user__email\"",
            "t1.\"role\"::text AS \"__label__user__role\"",
            "t2.\"nombre\"::text AS \"__label__space__name\"",
            "t0.\"fecha_reserva\"::text AS \"__label__date\"",
            "t0.\"precio_total\"::text AS \"total_price\"",
        ] {
            assert!(page.sql.contains(hidden), "missing {hidden} in {}", page.sql);
        }
    }

    #[test]
    fn ordering_appends_pk_tiebreaker() {
        let model = model();
        let entity = model.entity_by_path("users").unwrap();
        let query = ListQuery {
            ordering: vec![
                OrderBy {
                    field: "last_name".into(),
                    descending: false,
                },
                OrderBy {
                    field: "email".into(),
                    descending: true,
                },
            ],
            limit: 10,
            offset: 30,
            ..ListQuery::default()
        };
        let (page, _) = select_changelist(&model, entity, &query).unwrap();
        assert!(page.sql.ends_with(
            " ORDER BY t0.\"apellido\" ASC, t0.\"email\" DESC, t0.\"id\" DESC LIMIT 10 OFFSET 30"
        ));
    }

    #[test]
    fn limit_is_capped() {
        let model = model();
        let entity = model.entity_by_path("spaces").unwrap();
        let (page, _) = select_changelist(&model, entity, &page_query(50_000)).unwrap();
        assert!(page.sql.ends_with("LIMIT 1000 OFFSET 0"));
    }

    #[test]
    fn insert_fills_auto_timestamps() {
        let model = model();
        let entity = model.entity_by_path("reservation_reasons").unwrap();
        let name = entity.column("name").unwrap();
        let active = entity.column("active").unwrap();
        let q = insert(
            entity,
            &[(name, PgBindValue::text("Clase")), (active, PgBindValue::Bool(true))],
        );
        assert_eq!(
            q.sql,
            "INSERT INTO \"public\".\"motivos_reserva\" (\"nombre\", \"activo\") VALUES ($1::varchar, $2::boolean) RETURNING \"id\" AS \"id\""
        );

        let spaces = model.entity_by_path("spaces").unwrap();
        let q = insert(spaces, &[(spaces.column("name").unwrap(), PgBindValue::text("Lab"))]);
        assert!(q.sql.contains("(\"nombre\", \"fecha_creacion\", \"fecha_actualizacion\")"));
        assert!(q.sql.contains("VALUES ($1::varchar, NOW(), NOW())"));
    }

    #[test]
    fn update_touches_on_update_timestamp_only() {
        let model = model();
        let entity = model.entity_by_path("reservations").unwrap();
        let status = entity.column("status").unwrap();
        let q = update(entity, 7, &[(status, PgBindValue::text("confirmed"))]);
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"reservas\" SET \"estado\" = $1::varchar, \"fecha_actualizacion\" = NOW() WHERE \"id\" = $2::bigint RETURNING \"id\" AS \"id\""
        );
        assert_eq!(q.params, vec![PgBindValue::text("confirmed"), PgBindValue::I64(7)]);
    }

    #[test]
    fn empty_update_without_auto_columns_reads_pk() {
        let model = model();
        let entity = model.entity_by_path("reservation_reasons").unwrap();
        let q = update(entity, 3, &[]);
        assert!(q.sql.starts_with("SELECT \"id\" AS \"id\" FROM"));
    }

    #[test]
    fn delete_by_pk() {
        let model = model();
        let entity = model.entity_by_path("spaces").unwrap();
        let q = delete(entity, 9);
        assert_eq!(
            q.sql,
            "DELETE FROM \"public\".\"espacios\" WHERE \"id\" = $1::bigint RETURNING \"id\" AS \"id\""
        );
    }

    #[test]
    fn select_by_id_includes_label_joins() {
        let model = model();
        let entity = model.entity_by_path("reservations").unwrap();
        let q = select_by_id(&model, entity, 1).unwrap();
        assert!(q.sql.contains("t0.\"hora_inicio\" AS \"start_time\""));
        assert!(q.sql.contains("\"__label__user__email\""));
        assert!(q.sql.ends_with("WHERE t0.\"id\" = $1::bigint"));
    }
}
