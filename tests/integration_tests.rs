//! Integration tests for script-stepper

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use script_stepper::*;

fn hash160(data: &[u8]) -> [u8; 20] {
    let digest = Ripemd160::digest(Sha256::digest(data));
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// Locking script for the given redeem script: OP_HASH160 <hash> OP_EQUAL
fn p2sh_lock(redeem_script: &[u8]) -> Vec<u8> {
    let mut script = vec![0xa9, 0x14];
    script.extend_from_slice(&hash160(redeem_script));
    script.push(0x87);
    script
}

fn new_env(stack: Stack, script: Vec<u8>, flags: u32) -> ExecutionEnv<NoSignatureChecker> {
    ExecutionEnv::new(stack, script, flags, NoSignatureChecker, SigVersion::Base).unwrap()
}

#[test]
fn test_size_limit_rejected_before_anything_else() {
    // Even a script full of garbage is rejected on size alone.
    let script = vec![0xff; MAX_SCRIPT_SIZE + 1];
    let result = ExecutionEnv::new(
        Vec::new(),
        script,
        0,
        NoSignatureChecker,
        SigVersion::Base,
    );
    assert!(matches!(result, Err(ScriptError::ScriptSize)));
}

#[test]
fn test_empty_script_succeeds_immediately() {
    let mut env = new_env(Vec::new(), Vec::new(), 0);
    assert!(env.is_done());
    assert_eq!(env.step(), Ok(StepOutcome::Done));
    assert_eq!(env.error(), None);
}

#[test]
fn test_p2sh_false_branch_yields_eval_false() {
    let redeem_script = vec![0x51]; // OP_1
    let lock = p2sh_lock(&redeem_script);
    // The stack holds the wrong preimage, so the embedded hash check fails
    // and the exhausted script ends with a falsy top element.
    let mut env = new_env(vec![vec![0x52]], lock, 0);
    assert!(env.is_p2sh());

    let result = run(&mut env);
    assert_eq!(result, Err(ScriptError::EvalFalse));
}

#[test]
fn test_p2sh_redemption_swaps_in_redeem_script() {
    let redeem_script = vec![0x51]; // OP_1
    let lock = p2sh_lock(&redeem_script);
    let initial_stack = vec![vec![0xaa], redeem_script.clone()];
    let mut env = new_env(initial_stack.clone(), lock, 0);
    assert!(env.is_p2sh());

    // Drive the hash-check template to exhaustion: push-hash step, HASH160,
    // EQUAL each take one step.
    while env.pc() < env.working_script().len() {
        assert_eq!(env.step(), Ok(StepOutcome::Continue));
    }

    // One more step runs the epilogue.
    assert_eq!(env.step(), Ok(StepOutcome::Continue));
    assert!(!env.is_p2sh());
    assert!(!env.is_done());
    // Stack equals the construction-time snapshot minus its top element,
    // and the working script is now the removed element.
    assert_eq!(env.stack(), &vec![vec![0xaa]]);
    assert_eq!(env.working_script(), &redeem_script[..]);
    assert_eq!(env.input_script(), &p2sh_lock(&redeem_script)[..]);
    assert_eq!(env.pc(), 0);

    // Execution proceeds into the redeem script and terminates normally.
    assert_eq!(env.step(), Ok(StepOutcome::Continue)); // OP_1
    assert_eq!(env.step(), Ok(StepOutcome::Done));
    assert!(env.is_done());
    assert_eq!(env.stack(), &vec![vec![0xaa], vec![0x01]]);
}

#[test]
fn test_p2sh_redemption_with_multi_op_redeem_script() {
    // Full run through the helper: hash check, swap, then a redeem script
    // with several opcodes of its own.
    let redeem_script = vec![0x51, 0x51, 0x87]; // OP_1 OP_1 OP_EQUAL
    let lock = p2sh_lock(&redeem_script);
    let mut env = new_env(vec![redeem_script.clone()], lock, 0);
    assert_eq!(run(&mut env), Ok(()));
    assert_eq!(env.stack(), &vec![vec![0x01]]);
}

#[test]
fn test_unbalanced_conditional_never_succeeds() {
    // OP_1 OP_IF with no OP_ENDIF
    let mut env = new_env(Vec::new(), vec![0x51, 0x63], 0);
    assert_eq!(run(&mut env), Err(ScriptError::UnbalancedConditional));
    assert!(env.is_done());
    assert_eq!(env.error(), Some(ScriptError::UnbalancedConditional));
}

#[test]
fn test_push_only_gate_on_recorded_unlocking_script() {
    let redeem_script = vec![0x51];
    let lock = p2sh_lock(&redeem_script);

    // Non-push unlocking script with the gate enabled: the epilogue refuses
    // the redeem swap.
    let mut env = new_env(
        vec![redeem_script.clone()],
        lock.clone(),
        VERIFY_SIGPUSHONLY,
    );
    env.set_unlocking_script(vec![0x76]); // OP_DUP
    assert_eq!(run(&mut env), Err(ScriptError::SigPushOnly));

    // Same script with the gate disabled: legacy leniency.
    let mut env = new_env(vec![redeem_script.clone()], lock.clone(), 0);
    env.set_unlocking_script(vec![0x76]);
    assert_eq!(run(&mut env), Ok(()));

    // Gate enabled but nothing recorded: also lenient.
    let mut env = new_env(vec![redeem_script], lock, VERIFY_SIGPUSHONLY);
    assert_eq!(run(&mut env), Ok(()));
}

#[test]
fn test_determinism_of_outcome_sequences() {
    let redeem_script = vec![0x51];
    let lock = p2sh_lock(&redeem_script);

    let trace = |mut env: ExecutionEnv<NoSignatureChecker>| {
        let mut outcomes = Vec::new();
        loop {
            match env.step() {
                Ok(StepOutcome::Continue) => outcomes.push("continue".to_string()),
                Ok(StepOutcome::Done) => {
                    outcomes.push("done".to_string());
                    break;
                }
                Err(err) => {
                    outcomes.push(format!("err:{err:?}"));
                    break;
                }
            }
        }
        outcomes
    };

    let first = trace(new_env(vec![redeem_script.clone()], lock.clone(), 0));
    let second = trace(new_env(vec![redeem_script], lock, 0));
    assert_eq!(first, second);
}

#[test]
fn test_terminal_states_absorb_further_steps() {
    // Failure case
    let mut env = new_env(Vec::new(), vec![0x6a], 0); // OP_RETURN
    assert_eq!(env.step(), Err(ScriptError::OpReturn));
    let (stack, pc) = (env.stack().clone(), env.pc());
    assert_eq!(env.step(), Err(ScriptError::OpReturn));
    assert_eq!((env.stack().clone(), env.pc()), (stack, pc));

    // Success case
    let mut env = new_env(Vec::new(), vec![0x51], 0);
    assert_eq!(run(&mut env), Ok(()));
    let stack = env.stack().clone();
    assert_eq!(env.step(), Ok(StepOutcome::Done));
    assert_eq!(env.stack(), &stack);
}

#[test]
fn test_error_kinds_serialize_for_drivers() {
    let json = serde_json::to_string(&ScriptError::UnbalancedConditional).unwrap();
    assert_eq!(json, "\"UnbalancedConditional\"");
    let back: ScriptError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ScriptError::UnbalancedConditional);

    let json = serde_json::to_string(&StepOutcome::Continue).unwrap();
    let back: StepOutcome = serde_json::from_str(&json).unwrap();
    assert_eq!(back, StepOutcome::Continue);
}

#[test]
fn test_error_messages_name_the_failure() {
    assert_eq!(
        ScriptError::ScriptSize.to_string(),
        "script is over the maximum allowed size"
    );
    assert_eq!(ScriptError::OpReturn.to_string(), "OP_RETURN was encountered");
}

#[test]
fn test_diagnostic_disassembly_of_redeem_script() {
    let redeem_script = vec![0x51];
    let lock = p2sh_lock(&redeem_script);
    assert_eq!(
        disassemble(&lock),
        format!("OP_HASH160 {} OP_EQUAL", hex_str(&hash160(&redeem_script)))
    );
}
