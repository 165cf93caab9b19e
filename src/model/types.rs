//! Shared enumerations used across the metadata graph

use std::collections::HashMap;

/// Column/measure server-side scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Int64,
    Double,
    DateTime,
    String,
    Binary,
    Decimal,
    Variant,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Int64 => "Int64",
            DataType::Double => "Double",
            DataType::DateTime => "DateTime",
            DataType::String => "String",
            DataType::Binary => "Binary",
            DataType::Decimal => "Decimal",
            DataType::Variant => "Variant",
        }
    }

    /// Parses a DMV-reported type name, falling back to `Variant` for anything
    /// unrecognized rather than failing metadata iteration outright.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Boolean" => DataType::Boolean,
            "Int64" | "Integer" => DataType::Int64,
            "Double" => DataType::Double,
            "DateTime" | "Date" => DataType::DateTime,
            "String" => DataType::String,
            "Binary" => DataType::Binary,
            "Decimal" | "Currency" => DataType::Decimal,
            _ => DataType::Variant,
        }
    }
}

/// Discriminates synthetic row-number columns from user/calculated columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    RowNumber,
    Data,
    Calculated,
    CalculatedTableColumn,
}

impl ColumnKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "RowNumber" => ColumnKind::RowNumber,
            "Calculated" => ColumnKind::Calculated,
            "CalculatedTableColumn" => ColumnKind::CalculatedTableColumn,
            _ => ColumnKind::Data,
        }
    }
}

/// Partition storage mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    Import,
    DirectQuery,
    Dual,
}

impl PartitionMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "DirectQuery" => PartitionMode::DirectQuery,
            "Dual" => PartitionMode::Dual,
            _ => PartitionMode::Import,
        }
    }
}

/// Partition processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Ready,
    NoData,
    CalculationNeeded,
    Calculating,
}

impl PartitionState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Ready" => PartitionState::Ready,
            "CalculationNeeded" => PartitionState::CalculationNeeded,
            "Calculating" => PartitionState::Calculating,
            _ => PartitionState::NoData,
        }
    }
}

/// Partition source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    M,
    Calculated,
    CalculationGroup,
    Query,
}

impl SourceType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Calculated" => SourceType::Calculated,
            "CalculationGroup" => SourceType::CalculationGroup,
            "Query" => SourceType::Query,
            _ => SourceType::M,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossFilteringBehavior {
    OneDirection,
    BothDirections,
    Automatic,
}

impl CrossFilteringBehavior {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "BothDirections" => CrossFilteringBehavior::BothDirections,
            "Automatic" => CrossFilteringBehavior::Automatic,
            _ => CrossFilteringBehavior::OneDirection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityFilteringBehavior {
    OneDirection,
    BothDirections,
}

impl SecurityFilteringBehavior {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "BothDirections" => SecurityFilteringBehavior::BothDirections,
            _ => SecurityFilteringBehavior::OneDirection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatedProperty {
    Caption,
    Description,
    DisplayFolder,
}

impl TranslatedProperty {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Description" => TranslatedProperty::Description,
            "DisplayFolder" => TranslatedProperty::DisplayFolder,
            _ => TranslatedProperty::Caption,
        }
    }
}

/// Grab-bag for driver fields that are rarely used and not worth a named field.
///
/// This replaces the original library's transparent `__getattr__` forwarding onto the
/// underlying driver object (see DESIGN NOTES) with an explicit, inspectable map.
pub type Extras = HashMap<String, String>;
