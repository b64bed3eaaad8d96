//! Terminal output of runs and scenario descriptions.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use netdiffuse::{Experiment, NetworkSummary, TrajectoryLog};

pub fn print_run(name: &str, seed: Option<u64>, log: &TrajectoryLog) {
    println!("Scenario: {name}");
    match seed {
        Some(seed) => println!("Seed: {seed}"),
        None => println!("Seed: (entropy)"),
    }
    println!("Epochs: {}", log.epochs());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Layer"),
        header_cell("Compartment"),
        header_cell("Initial"),
        header_cell("Final"),
        header_cell("Peak"),
    ]);
    apply_table_style(&mut table);
    for column in 2..5 {
        align_right(&mut table, column);
    }

    for layer in log.layers() {
        let Some(compartments) = log.compartments(layer) else {
            continue;
        };
        for compartment in compartments.iter() {
            let Ok(series) = log.series(layer, compartment) else {
                continue;
            };
            let initial = series.first().copied().unwrap_or(0);
            let last = series.last().copied().unwrap_or(0);
            let peak = series.iter().copied().max().unwrap_or(0);
            table.add_row(vec![
                Cell::new(layer).add_attribute(Attribute::Bold),
                Cell::new(compartment),
                Cell::new(initial),
                change_cell(initial, last),
                Cell::new(peak),
            ]);
        }
    }
    println!("{table}");
    println!("Fingerprint: {}", log.fingerprint());
}

pub fn print_description(experiment: &Experiment) {
    println!("Scenario: {}", experiment.name());
    println!("Epochs: {}", experiment.epochs());
    print_network(&experiment.graph().summary());
    print!("{}", experiment.model());
}

fn print_network(summary: &NetworkSummary) {
    println!("Actors: {}", summary.actors);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Layer"),
        header_cell("Nodes"),
        header_cell("Edges"),
        header_cell("Mean degree"),
        header_cell("Initial counts"),
    ]);
    apply_table_style(&mut table);
    for column in 1..4 {
        align_right(&mut table, column);
    }
    for layer in &summary.layers {
        let counts = layer
            .compartments
            .iter()
            .zip(&layer.counts)
            .map(|(label, count)| format!("{label}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(&layer.name).add_attribute(Attribute::Bold),
            Cell::new(layer.nodes),
            Cell::new(layer.edges),
            Cell::new(format!("{:.2}", layer.mean_degree)),
            Cell::new(counts),
        ]);
    }
    println!("{table}");
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn change_cell(initial: usize, last: usize) -> Cell {
    let cell = Cell::new(last);
    match last.cmp(&initial) {
        std::cmp::Ordering::Greater => cell.fg(Color::Green),
        std::cmp::Ordering::Less => cell.fg(Color::Red),
        std::cmp::Ordering::Equal => cell.add_attribute(Attribute::Dim),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_right(table: &mut Table, index: usize) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(CellAlignment::Right);
    }
}
