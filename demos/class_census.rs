// One-shot class census against a running JVM
//
// Start the target with -agentlib:jdwp=transport=dt_socket,server=y,address=5005

use jdwp_client::JdwpConnection;

const TOP: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("jdwp_client=debug")
        .init();

    println!("Connecting to JDWP...");
    let conn = JdwpConnection::connect("localhost", 5005).await?;
    let version = conn.get_version().await?;
    println!("✓ Connected to {} ({})\n", version.vm_name, version.vm_version);

    conn.suspend_all().await?;

    let classes = conn.all_classes().await?;
    println!("Loaded classes: {}", classes.len());

    let ids: Vec<_> = classes.iter().map(|class| class.type_id).collect();
    let counts = conn.instance_counts(&ids).await?;

    let mut rows: Vec<_> = classes.iter().zip(counts).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    println!("\nTop {} classes by live instances:", TOP);
    for (class, count) in rows.iter().take(TOP) {
        println!("  {:>10}  {}", count, class.name());
    }

    conn.resume_all().await?;
    println!("\n✓ Resumed VM");
    Ok(())
}
