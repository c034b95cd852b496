use zoomoot::{establish_connection, verify_schema};

fn main() {
    let mut conn = establish_connection();
    let report = verify_schema(&mut conn).expect("Schema verification failed");
    println!(
        "Schema OK: {} activities, {} teams, {} scores, {} QR tokens.",
        report.activities, report.teams, report.scores, report.qr_tokens
    );
}
