//! Parse tab-separated fixture sheets into rows of cells using PEST.

use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "sheet.pest"]
struct SheetParser;

/// Prefix of comment rows and of comment cells.
pub const COMMENT_PREFIX: &str = "//";

/// Parse sheet text into rows, with comment rows, comment tails, trailing
/// empty cells and blank rows removed.
pub fn parse_sheet(source: &str) -> Result<Vec<Vec<String>>, String> {
    let pairs = SheetParser::parse(Rule::sheet, source).map_err(|e| format!("Parse error: {}", e))?;
    let sheet = pairs.into_iter().next().ok_or("Empty parse")?;
    let mut rows = Vec::new();
    for row in sheet.into_inner() {
        if row.as_rule() != Rule::row {
            continue;
        }
        let cells: Vec<String> = row.into_inner().map(build_cell).collect::<Result<_, _>>()?;
        if let Some(cells) = clean_row(cells) {
            rows.push(cells);
        }
    }
    Ok(rows)
}

fn build_cell(pair: pest::iterators::Pair<Rule>) -> Result<String, String> {
    match pair.as_rule() {
        Rule::bare => Ok(pair.as_str().to_string()),
        Rule::quoted => {
            let inner = pair.into_inner().next().ok_or("quoted cell: missing content")?;
            Ok(inner.as_str().replace("\"\"", "\""))
        }
        other => Err(format!("unexpected rule in row: {:?}", other)),
    }
}

fn clean_row(cells: Vec<String>) -> Option<Vec<String>> {
    if cells.first().is_some_and(|c| c.starts_with(COMMENT_PREFIX)) {
        return None;
    }
    let mut cells: Vec<String> = cells
        .into_iter()
        .take_while(|c| !c.starts_with(COMMENT_PREFIX))
        .collect();
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    if cells.is_empty() {
        None
    } else {
        Some(cells)
    }
}
