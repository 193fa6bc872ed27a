use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        load::{Kind, Load, OriginalState},
        report::TickReport,
    },
    quantity::power::Kilowatts,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn unknown() -> Cell {
    Cell::new("n/a").add_attribute(Attribute::Dim)
}

pub fn build_report_table(report: &TickReport) -> Table {
    let mut table = new_table();
    table.set_header(vec!["", ""]);
    table.add_row(vec![Cell::new("At"), Cell::new(report.at.format("%b %d %H:%M:%S"))]);
    table.add_row(vec![Cell::new("Mode"), Cell::new(report.mode)]);
    table.add_row(vec![Cell::new("Ceiling"), Cell::new(report.ceiling)]);
    table.add_row(vec![
        Cell::new("This hour"),
        report.energy_this_hour.map_or_else(unknown, Cell::new),
    ]);
    table.add_row(vec![
        Cell::new("House power"),
        report.house_power.map_or_else(unknown, Cell::new),
    ]);
    table.add_row(vec![
        Cell::new("Projected end"),
        report.projected_end.map_or_else(unknown, |projected_end| {
            Cell::new(projected_end).fg(if projected_end > report.ceiling {
                Color::Red
            } else {
                Color::Green
            })
        }),
    ]);
    table.add_row(vec![
        Cell::new("Needed reduction"),
        report.needed_reduction.map_or_else(unknown, |needed_reduction| {
            Cell::new(needed_reduction).fg(if needed_reduction > Kilowatts::ZERO {
                Color::Red
            } else {
                Color::Green
            })
        }),
    ]);
    table.add_row(vec![
        Cell::new("Remaining"),
        Cell::new(format!("{} s", report.remaining_seconds)).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![Cell::new("Last action"), Cell::new(&report.last_action)]);
    table.add_row(vec![Cell::new("Reason"), Cell::new(&report.last_action_reason)]);
    table
}

pub fn build_loads_table(loads: &[Load]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Load", "Priority", "Kind", "Enabled", "Snapshot"]);
    for load in loads {
        let kind = match &load.kind {
            Kind::Ampere(ampere) => format!("ampere {}..{}", ampere.min_amps, ampere.max_amps),
            Kind::Switch(switch) if switch.inverted => "switch (inverted)".to_string(),
            Kind::Switch(_) => "switch".to_string(),
        };
        let snapshot = match load.original {
            Some(OriginalState::Amperage(amps)) => Cell::new(amps),
            Some(OriginalState::Switch { on: true }) => Cell::new("on"),
            Some(OriginalState::Switch { on: false }) => Cell::new("off"),
            None => unknown(),
        };
        table.add_row(vec![
            Cell::new(&load.name).add_attribute(Attribute::Bold),
            Cell::new(load.priority).set_alignment(CellAlignment::Right),
            Cell::new(kind),
            Cell::new(load.enabled).fg(if load.enabled { Color::Green } else { Color::Red }),
            snapshot,
        ]);
    }
    table
}
