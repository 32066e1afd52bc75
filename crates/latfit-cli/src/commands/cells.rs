use crate::error::Result;
use latfit::engine::symmetry::CellType;

pub fn run() -> Result<()> {
    print!("{}", render_table());
    Ok(())
}

fn render_table() -> String {
    let mut out = format!("{:<26}{}\n", "Cell type", "Free parameters");
    for cell_type in CellType::ALL {
        out.push_str(&format!(
            "{:<26}{}\n",
            cell_type.to_string(),
            cell_type.parameter_names().join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_every_cell_type() {
        let table = render_table();
        assert_eq!(table.lines().count(), 1 + CellType::ALL.len());
        assert!(table.contains("Monoclinic ( b unique )"));
        assert!(table.lines().any(|l| l.starts_with("Hexagonal") && l.ends_with("a, c")));
    }
}
