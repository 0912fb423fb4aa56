// Input/output logic.
use std::{fs, io::{self, Read}, path::Path};

// Read a JSON file and return it as a string.
pub fn read_json_file(path: &Path) -> io::Result<String> {
    let mut json = String::new();
    let mut file = fs::File::open(path)?;
    file.read_to_string(&mut json)?;
    return Ok(json);
}
