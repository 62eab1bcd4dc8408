//! PostgreSQL implementations of the repositories.
//!
//! Every operation takes its own connection from the pool and gives it back
//! when it returns. Relations are loaded with one batched `= ANY($1)` query
//! per relation instead of one query per parent row.

use std::collections::HashMap;

use model::{Category, Field, FieldValue, Order, OrderLine, Position, User};
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row};

use crate::RepositoryError;

mod categories;
mod orders;
mod positions;
mod users;

pub use categories::PgCategoriesRepository;
pub use orders::PgOrdersRepository;
pub use positions::PgPositionsRepository;
pub use users::PgUsersRepository;

type Param = Box<dyn ToSql + Sync + Send>;

/// Positional parameters of a statement being assembled.
#[derive(Default)]
pub(crate) struct Params(Vec<Param>);

impl Params {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter and returns its placeholder.
    pub(crate) fn bind<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> String {
        self.0.push(Box::new(value));
        format!("${}", self.0.len())
    }

    fn bind_value(&mut self, value: &FieldValue) -> String {
        match value {
            FieldValue::BigInt(v) => self.bind(*v),
            FieldValue::Int(v) => self.bind(*v),
            FieldValue::Text(v) => self.bind(v.clone()),
            FieldValue::Keyword(v) => self.bind(*v),
            FieldValue::Timestamp(v) => self.bind(*v),
        }
    }

    pub(crate) fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.0
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Escapes `LIKE` metacharacters so user input only matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// ` WHERE a AND b`, or an empty string when there are no fields.
pub(crate) fn where_clause(fields: &[Field], params: &mut Params) -> String {
    if fields.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = fields
        .iter()
        .map(|field| match &field.value {
            FieldValue::Text(needle) => {
                let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
                format!("LOWER({}) LIKE {}", field.column, params.bind(pattern))
            }
            value => format!("{} = {}", field.column, params.bind_value(value)),
        })
        .collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

/// `a = $1, b = $2` for an `UPDATE ... SET`.
pub(crate) fn set_clause(fields: &[Field], params: &mut Params) -> String {
    fields
        .iter()
        .map(|field| format!("{} = {}", field.column, params.bind_value(&field.value)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn id_field(id: i64) -> Field {
    Field::new("id", FieldValue::BigInt(id))
}

fn category_from_row(row: &Row) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        positions: None,
    }
}

fn position_from_row(row: &Row) -> Position {
    Position {
        id: row.get("id"),
        name: row.get("name"),
        category_id: row.get("category_id"),
        weight: row.get("weight"),
        price: row.get("price"),
        category: None,
    }
}

fn user_from_row(row: &Row) -> Result<User, RepositoryError> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        role: role.parse()?,
        orders: None,
    })
}

fn order_from_row(row: &Row) -> Result<Order, RepositoryError> {
    let status: String = row.get("status");
    let obtaining_method: String = row.get("obtaining_method");
    Ok(Order {
        id: row.get("id"),
        date: row.get("date"),
        status: status.parse()?,
        obtaining_method: obtaining_method.parse()?,
        user_id: row.get("user_id"),
        lines: None,
    })
}

pub(crate) const CATEGORY_COLUMNS: &str = "id, name";
pub(crate) const POSITION_COLUMNS: &str = "id, name, category_id, weight, price";
pub(crate) const USER_COLUMNS: &str = "id, role";
pub(crate) const ORDER_COLUMNS: &str = "id, date, status, obtaining_method, user_id";

/// Positions grouped by category id.
pub(crate) async fn load_positions_of<C: GenericClient + Sync>(
    client: &C,
    category_ids: &[i64],
) -> Result<HashMap<i64, Vec<Position>>, RepositoryError> {
    let query = format!(
        "SELECT {POSITION_COLUMNS} FROM positions WHERE category_id = ANY($1) ORDER BY id"
    );
    let ids = category_ids.to_vec();
    let rows = client.query(query.as_str(), &[&ids]).await?;
    let mut grouped: HashMap<i64, Vec<Position>> = HashMap::new();
    for row in rows {
        let position = position_from_row(&row);
        grouped.entry(position.category_id).or_default().push(position);
    }
    Ok(grouped)
}

/// Categories by id.
pub(crate) async fn load_categories<C: GenericClient + Sync>(
    client: &C,
    ids: &[i64],
) -> Result<HashMap<i64, Category>, RepositoryError> {
    let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1)");
    let ids = ids.to_vec();
    let rows = client.query(query.as_str(), &[&ids]).await?;
    Ok(rows
        .iter()
        .map(category_from_row)
        .map(|c| (c.id, c))
        .collect())
}

/// Order lines grouped by order id, each with its position and the
/// position's category.
pub(crate) async fn load_lines_of<C: GenericClient + Sync>(
    client: &C,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderLine>>, RepositoryError> {
    let query = r#"
        SELECT op.order_id, op.position_id, op.quantity, op.weight AS line_weight,
               p.name, p.category_id, p.weight, p.price, c.name AS category_name
        FROM order_positions op
        JOIN positions p ON p.id = op.position_id
        JOIN categories c ON c.id = p.category_id
        WHERE op.order_id = ANY($1)
        ORDER BY op.order_id, op.position_id
    "#;
    let ids = order_ids.to_vec();
    let rows = client.query(query, &[&ids]).await?;
    let mut grouped: HashMap<i64, Vec<OrderLine>> = HashMap::new();
    for row in rows {
        let order_id: i64 = row.get("order_id");
        let position_id: i64 = row.get("position_id");
        let category_id: i64 = row.get("category_id");
        grouped.entry(order_id).or_default().push(OrderLine {
            order_id,
            position_id,
            quantity: row.get("quantity"),
            weight: row.get("line_weight"),
            position: Some(Position {
                id: position_id,
                name: row.get("name"),
                category_id,
                weight: row.get("weight"),
                price: row.get("price"),
                category: Some(Category {
                    id: category_id,
                    name: row.get("category_name"),
                    positions: None,
                }),
            }),
        });
    }
    Ok(grouped)
}

/// Orders grouped by user id, with their lines loaded.
pub(crate) async fn load_orders_of<C: GenericClient + Sync>(
    client: &C,
    user_ids: &[i64],
) -> Result<HashMap<i64, Vec<Order>>, RepositoryError> {
    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ANY($1) ORDER BY id");
    let ids = user_ids.to_vec();
    let rows = client.query(query.as_str(), &[&ids]).await?;
    let mut orders = rows
        .iter()
        .map(order_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let mut lines = load_lines_of(client, &order_ids).await?;
    for order in &mut orders {
        order.lines = Some(lines.remove(&order.id).unwrap_or_default());
    }

    let mut grouped: HashMap<i64, Vec<Order>> = HashMap::new();
    for order in orders {
        grouped.entry(order.user_id).or_default().push(order);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_uses_like_for_text() {
        let mut params = Params::new();
        let fields = vec![
            Field::new("name", FieldValue::Text("Кап".into())),
            Field::new("category_id", FieldValue::BigInt(3)),
        ];
        let clause = where_clause(&fields, &mut params);
        assert_eq!(clause, " WHERE LOWER(name) LIKE $1 AND category_id = $2");
        assert_eq!(params.as_refs().len(), 2);
    }

    #[test]
    fn test_where_clause_is_empty_without_fields() {
        let mut params = Params::new();
        assert_eq!(where_clause(&[], &mut params), "");
        assert!(params.as_refs().is_empty());
    }

    #[test]
    fn test_set_clause_continues_numbering() {
        let mut params = Params::new();
        params.bind(1_i64);
        let fields = vec![
            Field::new("status", FieldValue::Keyword("completed")),
            Field::new("user_id", FieldValue::BigInt(5)),
        ];
        assert_eq!(set_clause(&fields, &mut params), "status = $2, user_id = $3");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("латте"), "латте");
    }
}
