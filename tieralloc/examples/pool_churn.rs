use tieralloc::TierAlloc;

#[global_allocator]
static A: TierAlloc = TierAlloc::new();

fn main() {
    let mut held = Vec::new();
    for i in 0..100_000u32 {
        held.push(Box::new([0u8; 8]));
        if i % 3 == 0 {
            held.pop();
        }
    }
    drop(held);

    let stats = A.stats();
    println!("pool hits:           {}", stats.pool_hits);
    println!("exhausted fallbacks: {}", stats.exhausted_fallbacks);
    println!("large bypass:        {}", stats.large_bypass);
    println!("pool releases:       {}", stats.pool_releases);
    println!("backing releases:    {}", stats.backing_releases);
    println!("free chunks:         {:?}", A.free_chunks());
}
