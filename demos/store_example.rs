//! Store example with complex state

use tincan_stores::{Store, Unequal};

#[derive(Clone, Debug)]
struct TodoItem {
    id: usize,
    text: String,
    completed: bool,
}

#[derive(Clone, Debug)]
struct AppState {
    todos: Vec<TodoItem>,
    filter: String,
}

// Every update counts as a change.
impl Unequal for AppState {}

fn main() {
    println!("=== Store Example ===\n");

    // Create a store with initial state
    let store = Store::new(AppState {
        todos: vec![],
        filter: "all".to_string(),
    });

    // Subscribe to state changes; the callback also runs right away
    let _sub = store.subscribe(|state| {
        println!(
            "State updated! Active todos: {}",
            state.todos.iter().filter(|t| !t.completed).count()
        );
    });

    // Add a todo
    println!("\nAdding todo...");
    store.update(|state| {
        let mut next = state.clone();
        next.todos.push(TodoItem {
            id: 1,
            text: "Learn stores".to_string(),
            completed: false,
        });
        next
    });

    // Complete the todo
    println!("\nCompleting todo...");
    store.update(|state| {
        let mut next = state.clone();
        if let Some(todo) = next.todos.first_mut() {
            todo.completed = true;
        }
        next
    });

    // Read final state
    println!("\nFinal state: {:#?}", store.get());
}
