/// Print resolved content, cut at `max_body` characters (0 = everything).
pub fn output_body(body: &str, max_body: usize) {
    let total = body.chars().count();
    if max_body == 0 || total <= max_body {
        println!("{body}");
        return;
    }

    let shown: String = body.chars().take(max_body).collect();
    println!("{shown}");
    println!("\n... [{} more chars]", total - max_body);
}
