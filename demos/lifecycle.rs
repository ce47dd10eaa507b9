//! Start hooks, revocable setters and foreign stores

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tincan_stores::{
    create_derived, ForeignRegistry, ForeignStore, ForeignTeardown, Setter, Store, Teardown,
};

/// An observable from "somewhere else": a single-listener thermometer.
#[derive(Default)]
struct Thermometer {
    celsius: Cell<i32>,
    listener: Rc<RefCell<Option<Box<dyn Fn(i32)>>>>,
}

impl Thermometer {
    fn read(&self, celsius: i32) {
        self.celsius.set(celsius);
        if let Some(listener) = self.listener.borrow().as_ref() {
            listener(celsius);
        }
    }
}

impl ForeignStore for Thermometer {
    type Value = i32;

    fn subscribe(&self, callback: Box<dyn Fn(i32)>) -> ForeignTeardown {
        println!("   [Thermometer] listener attached");
        callback(self.celsius.get());
        *self.listener.borrow_mut() = Some(callback);

        let listener = Rc::clone(&self.listener);
        ForeignTeardown::callback(move || {
            println!("   [Thermometer] listener detached");
            listener.borrow_mut().take();
        })
    }
}

fn main() {
    println!("=== Lifecycle Example ===\n");

    println!("1. A store with a start hook");
    let parked: Rc<RefCell<Option<Setter<u32>>>> = Rc::new(RefCell::new(None));
    let ticks = Store::with_start(0u32, {
        let parked = Rc::clone(&parked);
        move |set: &Setter<u32>| {
            println!("   [Start] first subscriber arrived");
            *parked.borrow_mut() = Some(set.clone());
            Some(Box::new(|| println!("   [Stop] last subscriber left")) as Teardown)
        }
    });

    let sub = ticks.subscribe(|n| println!("   [Subscriber] ticks = {n}"));
    if let Some(set) = parked.borrow().as_ref() {
        set.update(|n| n + 1);
        set.update(|n| n + 1);
    }

    println!("\n2. Unsubscribing disables the parked setter");
    sub.unsubscribe();
    if let Some(set) = parked.borrow().as_ref() {
        set.set(100);
        println!("   setter enabled: {}", set.is_enabled());
    }
    println!("   ticks slot: {}", ticks.peek());

    println!("\n3. Adapting a foreign observable");
    let registry = ForeignRegistry::new();
    let thermometer = Rc::new(Thermometer::default());

    let fahrenheit =
        create_derived(registry.adapt(&thermometer), |c: i32| c * 9 / 5 + 32).unwrap();
    let warm = create_derived(registry.adapt(&thermometer), |c: i32| c >= 25).unwrap();

    let _f = fahrenheit.subscribe(|f| println!("   [Subscriber] {f}°F"));
    let _w = warm.subscribe(|w| println!("   [Subscriber] warm: {w}"));

    thermometer.read(30);
    println!("   adapters registered: {}", registry.len());

    println!("\n✓ Example complete!");
}
