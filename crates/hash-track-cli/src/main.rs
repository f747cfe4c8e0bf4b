use std::process;

fn main() {
    match hash_track_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("hash-track error: {err:#}");
            process::exit(1);
        }
    }
}
