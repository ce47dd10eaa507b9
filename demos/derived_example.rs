//! Demonstration of derived stores and glitch-free propagation

use std::cell::Cell;
use std::rc::Rc;
use tincan_stores::{create_derived, Store};

fn main() {
    println!("=== Derived Stores Example ===\n");

    println!("1. Creating a derived store that tracks computation count");
    let count = Store::new(5);
    let compute_counter = Rc::new(Cell::new(0));

    let doubled = create_derived(count.clone(), {
        let counter = Rc::clone(&compute_counter);
        move |n: i32| {
            counter.set(counter.get() + 1);
            println!("   [Computing] Doubling {n}...");
            n * 2
        }
    })
    .unwrap();

    println!("\n2. Nothing computed until someone subscribes");
    println!("   Computation count: {}", compute_counter.get());

    println!("\n3. Subscribing");
    let _sub = doubled.subscribe(|value| println!("   [Subscriber] doubled = {value}"));
    println!("   Computation count: {}", compute_counter.get());

    println!("\n4. Setting the same value again - no recomputation");
    count.set(5);
    println!("   Computation count: {}", compute_counter.get());

    println!("\n5. Updating source store");
    count.set(10);
    println!("   Computation count: {}", compute_counter.get());

    // Diamond: two branches share one root
    println!("\n6. Diamond-shaped graph");
    let root = Store::new(1);
    let plus_one = create_derived(root.clone(), |r: i32| r + 1).unwrap();
    let times_ten = create_derived(root.clone(), |r: i32| r * 10).unwrap();
    let sum = create_derived((plus_one, times_ten), |(a, b): (i32, i32)| {
        println!("   [Computing] Sum of {a} and {b}...");
        a + b
    })
    .unwrap();

    let _sum_sub = sum.subscribe(|value| println!("   [Subscriber] sum = {value}"));

    println!("\n7. Changing the root - the sum runs once, with both branches fresh");
    root.set(2);

    println!("\n✓ Example complete!");
    println!(
        "   Total computations of doubled: {}",
        compute_counter.get()
    );
}
