use state_machines::state_machine;

state_machine! {
    name: QueryMachine,
    state: QueryState,
    initial: Ready,
    states: [Ready, Analyzed, Reformed, Retrieved, Responded, Failed],
    events {
        analyze { transition: { from: Ready, to: Analyzed } }
        reform { transition: { from: Analyzed, to: Reformed } }
        skip_reform { transition: { from: Analyzed, to: Reformed } }
        retrieve { transition: { from: Reformed, to: Retrieved } }
        respond { transition: { from: Retrieved, to: Responded } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Analyzed, to: Failed }
            transition: { from: Reformed, to: Failed }
            transition: { from: Retrieved, to: Failed }
        }
    }
}

pub fn ready() -> QueryMachine<(), Ready> {
    QueryMachine::new(())
}
