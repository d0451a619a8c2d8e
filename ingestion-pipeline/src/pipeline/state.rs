use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Ready,
    states: [Ready, Loaded, Chunked, Indexed, Persisted, Failed],
    events {
        load { transition: { from: Ready, to: Loaded } }
        chunk { transition: { from: Loaded, to: Chunked } }
        index { transition: { from: Chunked, to: Indexed } }
        persist { transition: { from: Indexed, to: Persisted } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Loaded, to: Failed }
            transition: { from: Chunked, to: Failed }
            transition: { from: Indexed, to: Failed }
        }
    }
}

pub fn ready() -> IngestionMachine<(), Ready> {
    IngestionMachine::new(())
}
