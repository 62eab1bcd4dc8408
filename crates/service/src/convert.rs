//! Record to schema conversion.
//!
//! A relation that was not loaded stays `None` in the schema, and so does
//! any price that depends on a position that was not loaded.

use cart::Cart;
use model::{
    Category, CategorySchema, Order, OrderLine, OrderLineSchema, OrderSchema, Position,
    PositionSchema, User, UserSchema,
};
use serde::Serialize;

pub fn category_schema(category: Category) -> CategorySchema {
    CategorySchema {
        id: category.id,
        name: category.name,
        positions: category
            .positions
            .map(|positions| positions.into_iter().map(position_schema).collect()),
    }
}

pub fn position_schema(position: Position) -> PositionSchema {
    PositionSchema {
        id: position.id,
        name: position.name,
        category_id: position.category_id,
        weight: position.weight,
        price: position.price,
        category: position.category.map(category_schema),
    }
}

pub fn user_schema(user: User) -> UserSchema {
    UserSchema {
        id: user.id,
        role: user.role,
        orders: user
            .orders
            .map(|orders| orders.into_iter().map(order_schema).collect()),
    }
}

pub fn line_schema(line: OrderLine) -> OrderLineSchema {
    OrderLineSchema {
        total_price: line.total_price(),
        position_id: line.position_id,
        quantity: line.quantity,
        weight: line.weight,
        position: line.position.map(position_schema),
    }
}

pub fn order_schema(order: Order) -> OrderSchema {
    OrderSchema {
        total_price: order.total_price(),
        id: order.id,
        user_id: order.user_id,
        date: order.date,
        status: order.status,
        obtaining_method: order.obtaining_method,
        order_positions: order
            .lines
            .map(|lines| lines.into_iter().map(line_schema).collect()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineSchema {
    pub position: PositionSchema,
    pub quantity: i32,
    pub total_price: i64,
}

/// A user's cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSchema {
    pub user_id: i64,
    pub items: Vec<CartLineSchema>,
    pub total_price: i64,
}

pub fn cart_schema(user_id: i64, cart: &Cart) -> CartSchema {
    CartSchema {
        user_id,
        items: cart
            .items()
            .map(|item| CartLineSchema {
                position: item.position.clone(),
                quantity: item.quantity,
                total_price: item.total_price(),
            })
            .collect(),
        total_price: cart.total_price(),
    }
}
