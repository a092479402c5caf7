use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::rundeck::{Job, Project};

/// Prints the projects visible to the session.
pub fn print_projects(projects: &[Project]) {
    println!("{}", render_projects(projects));
}

/// Prints jobs grouped as the server listed them.
pub fn print_jobs(jobs: &[Job]) {
    println!("{}", render_jobs(jobs));
}

fn render_projects(projects: &[Project]) -> Table {
    let mut table = create_table();
    table.set_header(create_cyan_header(&["Project", "Description"]));

    for project in projects {
        table.add_row(vec![
            Cell::new(&project.name),
            Cell::new(project.description.as_deref().unwrap_or_default()),
        ]);
    }

    table
}

fn render_jobs(jobs: &[Job]) -> Table {
    let mut table = create_table();
    table.set_header(create_cyan_header(&["Project", "Job", "ID", "Description"]));

    for job in jobs {
        table.add_row(vec![
            Cell::new(&job.project),
            Cell::new(job.full_name()),
            Cell::new(&job.id).fg(TableColor::DarkGrey),
            Cell::new(job.description.as_deref().unwrap_or_default()),
        ]);
    }

    table
}

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}
