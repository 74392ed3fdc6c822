//! Row shapes of the five reservation tables. The tables are owned and migrated elsewhere;
//! these declarations only describe them.

use crate::config::{
    AutoTimestamp, ColumnConfig, ColumnType, LabelPart, RelationshipConfig, TableConfig,
};

const PRICE: ColumnType = ColumnType::Numeric {
    precision: 10,
    scale: 2,
};

fn varchar(max_length: u32) -> ColumnType {
    ColumnType::VarChar { max_length }
}

fn table(id: &str, name: &str, verbose_name: &str, verbose_name_plural: &str, label: Vec<LabelPart>) -> TableConfig {
    TableConfig {
        id: id.into(),
        name: name.into(),
        primary_key: "id".into(),
        managed: false,
        verbose_name: verbose_name.into(),
        verbose_name_plural: verbose_name_plural.into(),
        label,
    }
}

fn field(path: &str) -> LabelPart {
    LabelPart::Field(path.into())
}

fn lit(s: &str) -> LabelPart {
    LabelPart::Literal(s.into())
}

/// Column builder: `col(table, field, column, type)`, then `.null()` / `.auto(..)`.
struct Col(ColumnConfig);

fn col(table_id: &str, field: &str, column: &str, type_: ColumnType) -> Col {
    Col(ColumnConfig {
        table_id: table_id.into(),
        field: field.into(),
        column: column.into(),
        type_,
        nullable: false,
        auto: None,
    })
}

impl Col {
    fn null(mut self) -> Self {
        self.0.nullable = true;
        self
    }

    fn auto(mut self, auto: AutoTimestamp) -> Self {
        self.0.auto = Some(auto);
        self
    }
}

pub fn tables() -> Vec<TableConfig> {
    vec![
        table("space_types", "tipos_espacios", "Space Type", "Space Types", vec![field("name")]),
        table("spaces", "espacios", "Space", "Spaces", vec![field("name")]),
        table(
            "reservation_reasons",
            "motivos_reserva",
            "Reservation Reason",
            "Reservation Reasons",
            vec![field("name")],
        ),
        table(
            "users",
            "usuarios",
            "User",
            "Users",
            vec![field("email"), lit(" ("), field("role"), lit(")")],
        ),
        table(
            "reservations",
            "reservas",
            "Reservation",
            "Reservations",
            vec![
                field("user__email"),
                lit(" - "),
                field("space__name"),
                lit(" ("),
                field("date"),
                lit(")"),
            ],
        ),
    ]
}

pub fn columns() -> Vec<ColumnConfig> {
    use AutoTimestamp::{OnCreate, OnUpdate};
    use ColumnType::*;

    let st = "space_types";
    let sp = "spaces";
    let rr = "reservation_reasons";
    let us = "users";
    let rv = "reservations";

    [
        col(st, "id", "id", BigInt),
        col(st, "name", "nombre", varchar(100)),
        col(st, "description", "descripcion", Text).null(),
        col(st, "icon", "icono", varchar(50)).null(),
        col(st, "active", "activo", Boolean),
        col(st, "created_at", "fecha_creacion", Timestamp).auto(OnCreate),
        col(sp, "id", "id", BigInt),
        col(sp, "name", "nombre", varchar(150)),
        col(sp, "description", "descripcion", Text),
        col(sp, "location", "ubicacion", varchar(200)),
        col(sp, "capacity", "capacidad", Integer),
        col(sp, "space_type", "tipo_espacio_id", BigInt),
        col(sp, "hourly_price", "precio_por_hora", PRICE),
        col(sp, "equipment", "equipamiento", Text).null(),
        col(sp, "image_url", "imagen_url", varchar(255)).null(),
        col(sp, "active", "activo", Boolean),
        col(sp, "created_at", "fecha_creacion", Timestamp).auto(OnCreate),
        col(sp, "updated_at", "fecha_actualizacion", Timestamp).auto(OnUpdate),
        col(rr, "id", "id", BigInt),
        col(rr, "name", "nombre", varchar(100)),
        col(rr, "description", "descripcion", Text).null(),
        col(rr, "active", "activo", Boolean),
        col(us, "id", "id", BigInt),
        col(us, "email", "email", varchar(255)),
        col(us, "first_name", "nombre", varchar(255)),
        col(us, "last_name", "apellido", varchar(255)),
        col(us, "phone", "telefono", varchar(20)).null(),
        col(us, "student_id", "carnet_estudiantil", varchar(50)).null(),
        col(us, "google_id", "google_id", varchar(255)).null(),
        // Free text: no role enumeration is enforced here.
        col(us, "role", "role", varchar(50)),
        col(us, "active", "activo", Boolean),
        col(us, "registered_at", "fecha_registro", Timestamp).auto(OnCreate),
        col(rv, "id", "id", BigInt),
        col(rv, "user", "usuario_id", BigInt),
        col(rv, "space", "espacio_id", BigInt),
        col(rv, "date", "fecha_reserva", Date),
        col(rv, "start_time", "hora_inicio", Time),
        col(rv, "end_time", "hora_fin", Time),
        col(rv, "motive", "motivo", varchar(200)).null(),
        col(rv, "status", "estado", varchar(20)),
        col(rv, "total_price", "precio_total", PRICE).null(),
        col(rv, "observations", "observaciones", Text).null(),
        col(rv, "created_at", "fecha_creacion", Timestamp).auto(OnCreate),
        col(rv, "updated_at", "fecha_actualizacion", Timestamp).auto(OnUpdate),
    ]
    .into_iter()
    .map(|c| c.0)
    .collect()
}

pub fn relationships() -> Vec<RelationshipConfig> {
    let rel = |id: &str, from_table_id: &str, from_field: &str, to_table_id: &str| RelationshipConfig {
        id: id.into(),
        from_table_id: from_table_id.into(),
        from_field: from_field.into(),
        to_table_id: to_table_id.into(),
    };
    vec![
        rel("space_space_type", "spaces", "space_type", "space_types"),
        rel("reservation_user", "reservations", "user", "users"),
        rel("reservation_space", "reservations", "space", "spaces"),
    ]
}
