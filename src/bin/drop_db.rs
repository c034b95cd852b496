use zoomoot::{drop_schema, establish_connection};

fn main() {
    let mut conn = establish_connection();
    drop_schema(&mut conn).expect("Failed to drop schema");
    println!("All tables dropped.");
}
