//! Order aggregate used by the integration tests.
#![allow(dead_code)]

use aggrepo_core::db::{apply_schema, open_db_in_memory};
use aggrepo_core::{
    Aggregate, AggregateId, AggregateRegistry, AggregateSchemaProvider, AggregateVersion,
    ChildEntities, ChildEntitiesByType, ChildEntity, ChildEntityType, ColumnType,
    DeletedChildren, DomainEvent, Entity, EventDispatcher, EventLog, Identifier,
    PersistenceState, RepoResult, Schema, SchemaError, SpecifiesSchema,
    SqliteAggregateRepository, State, VERSION_COLUMN,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::fmt;

pub const DEFAULT_QUANTITY_PRECISION: i64 = 2;

/// Per-line version column; only guarded when configured as the
/// repository's version column.
pub const LINE_REVISION_COLUMN: &str = "line_revision";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderId {
    pub order_id: String,
    pub company_id: i64,
}

impl OrderId {
    pub fn new(order_id: &str, company_id: i64) -> Self {
        Self {
            order_id: order_id.to_string(),
            company_id,
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.order_id, self.company_id)
    }
}

impl AggregateId for OrderId {}

fn key_of(id: &OrderId) -> Identifier {
    State::new()
        .with_text("order_id", id.order_id.as_str())
        .with_integer("company_id", id.company_id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreated {
    pub id: OrderId,
}
impl DomainEvent for OrderCreated {}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdated {
    pub id: OrderId,
}
impl DomainEvent for OrderUpdated {}

#[derive(Debug, Clone, PartialEq)]
pub struct LineAdded {
    pub line_number: i64,
}
impl DomainEvent for LineAdded {}

#[derive(Debug, Clone, PartialEq)]
pub struct LineUpdated {
    pub line_number: i64,
}
impl DomainEvent for LineUpdated {}

#[derive(Debug, Clone, PartialEq)]
pub struct LineDeleted {
    pub line_number: i64,
}
impl DomainEvent for LineDeleted {}

#[derive(Debug)]
pub struct Line {
    order: OrderId,
    line_number: i64,
    product: String,
    quantity: f64,
    quantity_precision: i64,
    revision: AggregateVersion,
    persistence: PersistenceState,
}

impl Line {
    pub fn line_number(&self) -> i64 {
        self.line_number
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn quantity_precision(&self) -> i64 {
        self.quantity_precision
    }

    pub fn is_persisted(&self) -> bool {
        !self.persistence.is_new()
    }
}

impl Entity for Line {
    fn table_name() -> &'static str {
        "order_lines"
    }

    fn state(&mut self) -> State {
        key_of(&self.order)
            .with_integer("line_number", self.line_number)
            .with_text("product", self.product.as_str())
            .with_real("quantity", self.quantity)
            .with_integer(LINE_REVISION_COLUMN, self.revision.next())
    }

    fn identifier(&self) -> Identifier {
        key_of(&self.order).with_integer("line_number", self.line_number)
    }

    fn is_new(&self) -> bool {
        self.persistence.is_new()
    }

    fn mark_as_persisted(&mut self) {
        self.persistence.mark_as_persisted();
    }
}

impl ChildEntity for Line {
    type AggregateId = OrderId;

    fn identifier_for_query(aggregate_id: &OrderId) -> Identifier {
        key_of(aggregate_id)
    }

    fn from_state(state: State, aggregate_state: &State) -> RepoResult<Self> {
        let quantity_precision = if aggregate_state.contains("quantity_precision") {
            aggregate_state.integer("quantity_precision")?
        } else {
            DEFAULT_QUANTITY_PRECISION
        };

        Ok(Self {
            order: OrderId::new(state.text("order_id")?, state.integer("company_id")?),
            line_number: state.integer("line_number")?,
            product: state.text("product")?.to_string(),
            quantity: state.real("quantity")?,
            quantity_precision,
            revision: AggregateVersion::new(state.integer(LINE_REVISION_COLUMN)?),
            persistence: PersistenceState::new(),
        })
    }
}

#[derive(Debug)]
pub struct Order {
    id: OrderId,
    order_date: NaiveDate,
    description: String,
    lines: Vec<Line>,
    persistence: PersistenceState,
    version: AggregateVersion,
    events: EventLog,
    deleted: DeletedChildren,
}

impl Order {
    pub fn create(id: OrderId, order_date: NaiveDate, description: &str) -> Self {
        let mut events = EventLog::new();
        events.record_that(OrderCreated { id: id.clone() });
        Self {
            id,
            order_date,
            description: description.to_string(),
            lines: Vec::new(),
            persistence: PersistenceState::new(),
            version: AggregateVersion::default(),
            events,
            deleted: DeletedChildren::new(),
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, line_number: i64) -> Option<&Line> {
        self.lines
            .iter()
            .find(|line| line.line_number == line_number)
    }

    pub fn aggregate_version(&self) -> i64 {
        self.version.current()
    }

    pub fn set_aggregate_version(&mut self, version: i64) {
        self.version.set(version);
    }

    pub fn is_persisted(&self) -> bool {
        !self.persistence.is_new()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn update(&mut self, description: &str) {
        self.description = description.to_string();
        self.events.record_that(OrderUpdated {
            id: self.id.clone(),
        });
    }

    /// Appends a line numbered after the current highest one.
    pub fn add_line(&mut self, product: &str, quantity: f64) -> i64 {
        let line_number = self
            .lines
            .iter()
            .map(|line| line.line_number)
            .max()
            .unwrap_or(0)
            + 1;
        self.add_line_numbered(line_number, product, quantity);
        line_number
    }

    /// Appends a line with a caller-chosen number, even a taken one.
    pub fn add_line_numbered(&mut self, line_number: i64, product: &str, quantity: f64) {
        self.lines.push(Line {
            order: self.id.clone(),
            line_number,
            product: product.to_string(),
            quantity,
            quantity_precision: DEFAULT_QUANTITY_PRECISION,
            revision: AggregateVersion::default(),
            persistence: PersistenceState::new(),
        });
        self.events.record_that(LineAdded { line_number });
    }

    pub fn update_line(&mut self, line_number: i64, quantity: f64) -> bool {
        let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.line_number == line_number)
        else {
            return false;
        };
        line.quantity = quantity;
        self.events.record_that(LineUpdated { line_number });
        true
    }

    pub fn delete_line(&mut self, line_number: i64) -> bool {
        let Some(index) = self
            .lines
            .iter()
            .position(|line| line.line_number == line_number)
        else {
            return false;
        };
        let line = self.lines.remove(index);
        self.deleted.record(line);
        self.events.record_that(LineDeleted { line_number });
        true
    }
}

impl Entity for Order {
    fn table_name() -> &'static str {
        "orders"
    }

    fn state(&mut self) -> State {
        key_of(&self.id)
            .with_date("order_date", self.order_date)
            .with_text("description", self.description.as_str())
            .with_integer(VERSION_COLUMN, self.version.next())
    }

    fn identifier(&self) -> Identifier {
        key_of(&self.id)
    }

    fn is_new(&self) -> bool {
        self.persistence.is_new()
    }

    fn mark_as_persisted(&mut self) {
        self.persistence.mark_as_persisted();
    }
}

impl Aggregate for Order {
    type Id = OrderId;

    fn identifier_for_query(id: &OrderId) -> Identifier {
        key_of(id)
    }

    fn child_entity_types() -> Vec<ChildEntityType<OrderId>> {
        vec![ChildEntityType::of::<Line>()]
    }

    fn child_entities_by_type(&mut self) -> ChildEntitiesByType<'_> {
        let mut by_type = ChildEntitiesByType::new();
        by_type.insert(
            aggrepo_core::type_tag::<Line>(),
            self.lines
                .iter_mut()
                .map(|line| line as &mut dyn Entity)
                .collect(),
        );
        by_type
    }

    fn from_state(state: State, mut children: ChildEntities) -> RepoResult<Self> {
        Ok(Self {
            id: OrderId::new(state.text("order_id")?, state.integer("company_id")?),
            order_date: state.date("order_date")?,
            description: state.text("description")?.to_string(),
            lines: children.take::<Line>()?,
            persistence: PersistenceState::new(),
            version: AggregateVersion::new(state.integer(VERSION_COLUMN)?),
            events: EventLog::new(),
            deleted: DeletedChildren::new(),
        })
    }

    fn deleted_child_entities(&mut self) -> Vec<Box<dyn Entity>> {
        self.deleted.drain()
    }

    fn restore_deleted_child_entities(&mut self, children: Vec<Box<dyn Entity>>) {
        self.deleted.restore(children);
    }

    fn release_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        self.events.release()
    }
}

impl SpecifiesSchema for Order {
    fn specify_schema(schema: &mut Schema) -> Result<(), SchemaError> {
        schema
            .create_table(Order::table_name())?
            .add_column("order_id", ColumnType::Text)
            .add_column("company_id", ColumnType::Integer)
            .add_column("order_date", ColumnType::Date)
            .add_column("description", ColumnType::Text)
            .add_column(VERSION_COLUMN, ColumnType::Integer)
            .set_primary_key(&["order_id", "company_id"]);
        schema
            .create_table(Line::table_name())?
            .add_column("order_id", ColumnType::Text)
            .add_column("company_id", ColumnType::Integer)
            .add_column("line_number", ColumnType::Integer)
            .add_column("product", ColumnType::Text)
            .add_column("quantity", ColumnType::Real)
            .add_column(LINE_REVISION_COLUMN, ColumnType::Integer)
            .set_primary_key(&["order_id", "company_id", "line_number"]);
        Ok(())
    }
}

/// Records every dispatched batch.
#[derive(Debug, Default)]
pub struct EventDispatcherSpy {
    pub batches: Vec<Vec<Box<dyn DomainEvent>>>,
}

impl EventDispatcherSpy {
    pub fn last_batch(&self) -> &[Box<dyn DomainEvent>] {
        self.batches.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl EventDispatcher for EventDispatcherSpy {
    fn dispatch(&mut self, events: Vec<Box<dyn DomainEvent>>) {
        self.batches.push(events);
    }
}

pub type OrderRepository<'conn> = SqliteAggregateRepository<'conn, EventDispatcherSpy>;

pub fn order_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

pub fn order_connection() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    let schema = AggregateSchemaProvider::new()
        .with::<Order>()
        .create_schema()
        .unwrap();
    apply_schema(&mut conn, &schema).unwrap();
    conn
}

pub fn order_registry() -> AggregateRegistry {
    AggregateRegistry::new().with::<Order>().unwrap()
}

pub fn order_repository(conn: &mut Connection) -> OrderRepository<'_> {
    SqliteAggregateRepository::new(conn, order_registry(), EventDispatcherSpy::default())
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\";"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Unsaved order `{order_id}-5` holding lines `bolts` and `nuts`.
pub fn order_with_two_lines(order_id: &str) -> Order {
    let mut order = Order::create(OrderId::new(order_id, 5), order_date(), "first order");
    order.add_line("bolts", 10.0);
    order.add_line("nuts", 4.5);
    order
}

/// Field-for-field comparison, including children and version.
pub fn assert_same_order(actual: &Order, expected: &Order) {
    assert_eq!(actual.id(), expected.id());
    assert_eq!(actual.order_date(), expected.order_date());
    assert_eq!(actual.description(), expected.description());
    assert_eq!(actual.aggregate_version(), expected.aggregate_version());
    assert_eq!(actual.is_persisted(), expected.is_persisted());
    assert_eq!(actual.lines().len(), expected.lines().len());
    for (left, right) in actual.lines().iter().zip(expected.lines()) {
        assert_eq!(left.line_number(), right.line_number());
        assert_eq!(left.product(), right.product());
        assert_eq!(left.quantity(), right.quantity());
        assert_eq!(left.is_persisted(), right.is_persisted());
    }
}
