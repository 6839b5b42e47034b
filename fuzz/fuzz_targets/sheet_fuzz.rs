//! Sheet fuzz target: arbitrary text goes through the sheet parser and the file builder.
//! Neither may panic; malformed input must come back as an error.
//! Build with: cargo fuzz run sheet_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let rows = match recordlayout::parse_sheet(s) {
        Ok(rows) => rows,
        Err(_) => return,
    };
    let settings = std::sync::Arc::new(recordlayout::Settings::default());
    for kind in recordlayout::DataKind::ALL {
        if let Ok(files) = recordlayout::reader::build_files(&rows, kind, "", &settings) {
            for file in &files {
                let _ = file.expected_records();
            }
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run sheet_fuzz");
}
