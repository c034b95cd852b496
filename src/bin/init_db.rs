use zoomoot::{establish_connection, init_schema, verify_schema};

fn main() {
    let mut conn = establish_connection();
    init_schema(&mut conn).expect("Failed to initialize schema");
    let report = verify_schema(&mut conn).expect("Failed to verify schema");
    println!(
        "Database initialized: {} activities, {} teams, {} scores, {} QR tokens.",
        report.activities, report.teams, report.scores, report.qr_tokens
    );
}
