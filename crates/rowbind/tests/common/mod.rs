#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rowbind::{FieldTable, Record};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub birth_date: NaiveDate,
}

impl Record for Person {
    fn fields() -> FieldTable<Self> {
        FieldTable::new()
            .field("name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
            .field(
                "birth_date",
                |p: &Person| &p.birth_date,
                |p: &mut Person| &mut p.birth_date,
            )
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub customer: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub paid: bool,
    pub discount: Option<f32>,
    pub placed_at: NaiveDateTime,
    pub shipped_on: Option<NaiveDate>,
}

impl Record for Order {
    fn fields() -> FieldTable<Self> {
        FieldTable::new()
            .field("id", |o: &Order| &o.id, |o: &mut Order| &mut o.id)
            .field("customer", |o: &Order| &o.customer, |o: &mut Order| &mut o.customer)
            .field("quantity", |o: &Order| &o.quantity, |o: &mut Order| &mut o.quantity)
            .field(
                "unit_price",
                |o: &Order| &o.unit_price,
                |o: &mut Order| &mut o.unit_price,
            )
            .field("paid", |o: &Order| &o.paid, |o: &mut Order| &mut o.paid)
            .field("discount", |o: &Order| &o.discount, |o: &mut Order| &mut o.discount)
            .field(
                "placed_at",
                |o: &Order| &o.placed_at,
                |o: &mut Order| &mut o.placed_at,
            )
            .field(
                "shipped_on",
                |o: &Order| &o.shipped_on,
                |o: &mut Order| &mut o.shipped_on,
            )
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn li() -> Person {
    Person {
        name: "Li".into(),
        birth_date: ymd(2020, 1, 1),
    }
}

pub fn orders() -> Vec<Order> {
    vec![
        Order {
            id: 9_000_000_001,
            customer: "Acme, Inc.".into(),
            quantity: -3,
            unit_price: 19.99,
            paid: true,
            discount: Some(0.5),
            placed_at: ymd(2023, 7, 14).and_hms_opt(9, 30, 5).unwrap(),
            shipped_on: Some(ymd(2023, 7, 16)),
        },
        Order {
            id: 2,
            customer: "  padded  ".into(),
            quantity: 12,
            unit_price: 0.1,
            paid: false,
            discount: None,
            placed_at: ymd(1999, 12, 31).and_hms_opt(23, 59, 59).unwrap(),
            shipped_on: None,
        },
    ]
}

pub const ORDER_SPEC: [Option<&str>; 8] = [
    Some("id"),
    Some("customer"),
    Some("quantity"),
    Some("unit_price"),
    Some("paid"),
    Some("discount"),
    Some("placed_at"),
    Some("shipped_on"),
];

pub const ORDER_TITLES: [&str; 8] = [
    "Id", "Customer", "Qty", "Price", "Paid", "Discount", "Placed", "Shipped",
];
