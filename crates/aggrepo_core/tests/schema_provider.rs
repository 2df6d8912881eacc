mod support;

use aggrepo_core::db::{apply_schema, open_db_in_memory};
use aggrepo_core::{AggregateSchemaProvider, ColumnType, SchemaError};
use support::{count_rows, Order};

#[test]
fn provider_collects_tables_of_registered_aggregates() {
    let provider = AggregateSchemaProvider::new().with::<Order>();
    assert_eq!(provider.aggregate_types().len(), 1);
    assert!(provider.aggregate_types()[0].ends_with("Order"));

    let schema = provider.create_schema().unwrap();
    let names: Vec<&str> = schema.tables().iter().map(|table| table.name()).collect();
    assert_eq!(names, vec!["orders", "order_lines"]);

    let lines = schema.table("order_lines").unwrap();
    assert_eq!(lines.primary_key(), ["order_id", "company_id", "line_number"]);
    assert_eq!(lines.columns()[4].column_type, ColumnType::Real);
}

#[test]
fn duplicate_aggregate_declaration_is_rejected() {
    let err = AggregateSchemaProvider::new()
        .with::<Order>()
        .with::<Order>()
        .create_schema()
        .unwrap_err();

    assert_eq!(err, SchemaError::DuplicateTable("orders".to_string()));
}

#[test]
fn applying_the_schema_twice_keeps_existing_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let schema = AggregateSchemaProvider::new()
        .with::<Order>()
        .create_schema()
        .unwrap();

    apply_schema(&mut conn, &schema).unwrap();
    conn.execute(
        "INSERT INTO orders (order_id, company_id, order_date, description, aggregate_version)
         VALUES ('O1', 5, '2024-03-01', 'kept', 1);",
        [],
    )
    .unwrap();
    apply_schema(&mut conn, &schema).unwrap();

    assert_eq!(count_rows(&conn, "orders"), 1);
    assert_eq!(count_rows(&conn, "order_lines"), 0);
}

#[test]
fn generated_tables_enforce_not_null_columns() {
    let mut conn = open_db_in_memory().unwrap();
    let schema = AggregateSchemaProvider::new()
        .with::<Order>()
        .create_schema()
        .unwrap();
    apply_schema(&mut conn, &schema).unwrap();

    let result = conn.execute(
        "INSERT INTO orders (order_id, company_id, order_date, aggregate_version)
         VALUES ('O1', 5, '2024-03-01', 1);",
        [],
    );
    assert!(result.is_err());
}
