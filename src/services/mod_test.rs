use super::*;

#[test]
fn gate_rejects_second_entry() {
    let gate = StageGate::default();
    let ticket = gate.try_enter().unwrap();
    assert!(gate.is_busy());
    assert!(matches!(gate.try_enter(), Err(AuthError::Busy)));
    drop(ticket);
    assert!(!gate.is_busy());
    assert!(gate.try_enter().is_ok());
}
