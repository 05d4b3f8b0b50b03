//! Dump the lead database to an XLSX file without starting the bot.
//!
//! Usage: cargo run --bin export_leads <leads.db> <out.xlsx> [window] [timezone]

use std::path::Path;

use chrono::Utc;
use chrono_tz::Tz;

use leadbot::assistant::Database;
use leadbot::assistant::export::{self, ExportWindow};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 5 {
        eprintln!("Usage: {} <leads.db> <out.xlsx> [window] [timezone]", args[0]);
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  leads.db   Path to the bot database (data_dir/leads.db)");
        eprintln!("  out.xlsx   Where to write the spreadsheet");
        eprintln!("  window     all (default), 7d, 24h, 2w or a number of days");
        eprintln!("  timezone   IANA zone for timestamps (default Asia/Tashkent)");
        std::process::exit(1);
    }

    let db_path = Path::new(&args[1]);
    let out_path = Path::new(&args[2]);

    let window = match ExportWindow::parse(args.get(3).map(String::as_str).unwrap_or("all")) {
        Ok(w) => w,
        Err(e) => fail(&e),
    };
    let tz_name = args.get(4).map(String::as_str).unwrap_or("Asia/Tashkent");
    let tz: Tz = match tz_name.parse() {
        Ok(tz) => tz,
        Err(_) => fail(&format!("unknown timezone '{tz_name}'")),
    };

    if !db_path.exists() {
        fail(&format!("database {} does not exist", db_path.display()));
    }
    let database = match Database::open(db_path) {
        Ok(db) => db,
        Err(e) => fail(&e),
    };

    let leads = match window.cutoff(Utc::now()) {
        None => database.list_all(),
        Some(cutoff) => database.list_since(cutoff),
    };
    let leads = match leads {
        Ok(leads) => leads,
        Err(e) => fail(&e),
    };

    let data = match export::render_xlsx(&leads, tz) {
        Ok(data) => data,
        Err(e) => fail(&e),
    };
    if let Err(e) = std::fs::write(out_path, data) {
        fail(&format!("failed to write {}: {e}", out_path.display()));
    }

    println!("Exported {} lead(s) ({}) to {}", leads.len(), window.describe(), out_path.display());
}

fn fail(err: &dyn std::fmt::Display) -> ! {
    eprintln!("ERROR: {err}");
    std::process::exit(1);
}
