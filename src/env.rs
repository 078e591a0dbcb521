//! Step-wise script execution environment
//!
//! The environment is created once per script evaluation, stepped by an
//! external driver until it reports completion or an error, then discarded.
//! It is exclusively owned by that driver; nothing here blocks or yields.

use log::debug;

use crate::checker::SignatureChecker;
use crate::constants::{MAX_SCRIPT_SIZE, VERIFY_MINIMALDATA, VERIFY_SIGPUSHONLY};
use crate::error::{Result, ScriptError};
use crate::script::{cast_to_bool, disassemble, hex_str, is_pay_to_script_hash, is_push_only};
use crate::stepper;
use crate::types::{ByteString, SigVersion, Stack, StepOutcome};

/// Mutable aggregate state for one script evaluation.
///
/// The working script starts out as a view of the original input script and
/// is replaced exactly once, by the redeem script, if the P2SH epilogue runs.
pub struct ExecutionEnv<C: SignatureChecker> {
    /// Original input script, read-only for the lifetime of the environment.
    script: ByteString,
    /// Owned redeem-script buffer; present only after the P2SH swap.
    redeem_script: Option<ByteString>,
    /// Cursor and end bound into the current working script.
    pub(crate) pc: usize,
    end: usize,

    pub(crate) stack: Stack,
    pub(crate) altstack: Stack,
    pub(crate) cond_stack: Vec<bool>,
    pub(crate) op_count: usize,

    flags: u32,
    pub(crate) require_minimal: bool,
    pub(crate) sig_version: SigVersion,
    pub(crate) checker: C,

    is_p2sh: bool,
    /// Copy of the initial stack, taken only when the input matched the P2SH
    /// template; restored during the epilogue.
    p2sh_stack: Stack,
    /// Unlocking script the driver already executed, recorded only so the
    /// push-only gate can inspect it.
    unlocking_script: Option<ByteString>,

    done: bool,
    error: Option<ScriptError>,
}

impl<C: SignatureChecker> ExecutionEnv<C> {
    /// Build an environment over `script` with the given initial stack.
    ///
    /// The initial stack is the state left behind by the unlocking script the
    /// driver has already run. Rejects scripts over the protocol size limit
    /// before looking at anything else.
    pub fn new(
        initial_stack: Stack,
        script: ByteString,
        flags: u32,
        checker: C,
        sig_version: SigVersion,
    ) -> Result<Self> {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptError::ScriptSize);
        }

        let is_p2sh = is_pay_to_script_hash(&script);
        // The unlocking script has already been "executed" in the form of
        // pushes onto the initial stack, so snapshot it here for the
        // post-hash-check restore.
        let p2sh_stack = if is_p2sh {
            initial_stack.clone()
        } else {
            Vec::new()
        };

        let end = script.len();
        Ok(Self {
            script,
            redeem_script: None,
            pc: 0,
            end,
            stack: initial_stack,
            altstack: Vec::new(),
            cond_stack: Vec::new(),
            op_count: 0,
            require_minimal: flags & VERIFY_MINIMALDATA != 0,
            flags,
            sig_version,
            checker,
            is_p2sh,
            p2sh_stack,
            unlocking_script: None,
            done: end == 0,
            error: None,
        })
    }

    /// Record the unlocking script so the epilogue's push-only gate (enabled
    /// via `VERIFY_SIGPUSHONLY`) has something to inspect. Without a recorded
    /// script the gate is skipped.
    pub fn set_unlocking_script(&mut self, unlocking_script: ByteString) {
        self.unlocking_script = Some(unlocking_script);
    }

    /// Execute one transition: one opcode while instructions remain, the
    /// P2SH epilogue at exhaustion of a hash-check template, or the
    /// termination check.
    ///
    /// Terminal states are absorbing: stepping a finished environment returns
    /// `Done` again, stepping a failed one returns the same error again, and
    /// neither mutates any observable state.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.done {
            return Ok(StepOutcome::Done);
        }
        match self.step_transition() {
            Err(error) => {
                self.error = Some(error);
                Err(error)
            }
            ok => ok,
        }
    }

    fn step_transition(&mut self) -> Result<StepOutcome> {
        if self.pc < self.end {
            stepper::exec_step(self)?;
            return Ok(StepOutcome::Continue);
        }

        if self.is_p2sh {
            return self.p2sh_epilogue();
        }

        // At the true end; from here on the environment is terminal.
        self.done = true;

        if !self.cond_stack.is_empty() {
            return Err(ScriptError::UnbalancedConditional);
        }
        Ok(StepOutcome::Done)
    }

    /// Runs at most once per environment: the hash-check template has been
    /// executed, so swap in the redeem script and keep going.
    fn p2sh_epilogue(&mut self) -> Result<StepOutcome> {
        let Some(top) = self.stack.last() else {
            return Err(ScriptError::EvalFalse);
        };
        if !cast_to_bool(top) {
            return Err(ScriptError::EvalFalse);
        }

        // The shape test alone also matches a locking script run standalone;
        // only a genuine pay-to-script-hash consumption gets the swap.
        if !is_pay_to_script_hash(&self.script) {
            return Err(ScriptError::BadOpcode);
        }

        if self.flags & VERIFY_SIGPUSHONLY != 0 {
            if let Some(unlocking_script) = &self.unlocking_script {
                if !is_push_only(unlocking_script) {
                    return Err(ScriptError::SigPushOnly);
                }
            }
        }

        debug!("drop-in p2sh redeem script");

        self.is_p2sh = false;
        self.stack = std::mem::take(&mut self.p2sh_stack);

        // The snapshot held at least the serialized redeem script, otherwise
        // the HASH160 <hash> EQUAL run above would have started from an empty
        // stack and failed EvalFalse before reaching this point. An empty
        // snapshot here is an internal-consistency fault, not a script error.
        let Some(redeem_script) = self.stack.pop() else {
            panic!("p2sh stack snapshot empty after successful hash check");
        };

        if log::log_enabled!(log::Level::Debug) {
            for item in &self.stack {
                debug!("restored stack: {}", hex_str(item));
            }
            debug!("redeem script: {}", disassemble(&redeem_script));
        }

        // Replace the working script atomically with its cursor bounds so no
        // intermediate state holds a cursor past the old script.
        self.pc = 0;
        self.end = redeem_script.len();
        self.redeem_script = Some(redeem_script);

        Ok(StepOutcome::Continue)
    }

    /// The script currently being executed: the redeem script once the P2SH
    /// swap has happened, the original input script before that.
    pub fn working_script(&self) -> &[u8] {
        self.redeem_script.as_deref().unwrap_or(&self.script)
    }

    /// The original input script, unaffected by the redeem swap.
    pub fn input_script(&self) -> &[u8] {
        &self.script
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn altstack(&self) -> &Stack {
        &self.altstack
    }

    pub fn cond_stack(&self) -> &[bool] {
        &self.cond_stack
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn op_count(&self) -> usize {
        self.op_count
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn sig_version(&self) -> SigVersion {
        self.sig_version
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_p2sh(&self) -> bool {
        self.is_p2sh
    }

    /// The terminal error, if a step has failed.
    pub fn error(&self) -> Option<ScriptError> {
        self.error
    }
}

/// Drive an environment to completion, the way the debugger's run command
/// does: step until the script reports `Done` or fails.
pub fn run<C: SignatureChecker>(env: &mut ExecutionEnv<C>) -> Result<()> {
    loop {
        if let StepOutcome::Done = env.step()? {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::NoSignatureChecker;
    use crate::opcodes::*;

    fn env_for(stack: Stack, script: ByteString) -> ExecutionEnv<NoSignatureChecker> {
        ExecutionEnv::new(stack, script, 0, NoSignatureChecker, SigVersion::Base).unwrap()
    }

    fn p2sh_template(hash: &[u8; 20]) -> ByteString {
        let mut script = vec![OP_HASH160, 20];
        script.extend_from_slice(hash);
        script.push(OP_EQUAL);
        script
    }

    #[test]
    fn test_oversized_script_rejected() {
        let script = vec![OP_NOP; MAX_SCRIPT_SIZE + 1];
        let result =
            ExecutionEnv::new(Vec::new(), script, 0, NoSignatureChecker, SigVersion::Base);
        assert!(matches!(result, Err(ScriptError::ScriptSize)));
    }

    #[test]
    fn test_script_at_size_limit_accepted() {
        let script = vec![OP_NOP; MAX_SCRIPT_SIZE];
        assert!(
            ExecutionEnv::new(Vec::new(), script, 0, NoSignatureChecker, SigVersion::Base).is_ok()
        );
    }

    #[test]
    fn test_empty_script_done_at_construction() {
        let mut env = env_for(Vec::new(), Vec::new());
        assert!(env.is_done());
        assert_eq!(env.step(), Ok(StepOutcome::Done));
    }

    #[test]
    fn test_p2sh_detection() {
        let env = env_for(vec![vec![0x51]], p2sh_template(&[0xcd; 20]));
        assert!(env.is_p2sh());

        let env = env_for(Vec::new(), vec![OP_1, OP_1, OP_EQUAL]);
        assert!(!env.is_p2sh());
    }

    #[test]
    fn test_p2sh_snapshot_taken_at_construction() {
        let initial = vec![vec![0xaa], vec![0xbb]];
        let mut env = env_for(initial.clone(), p2sh_template(&[0xcd; 20]));
        // Mutating the live stack must not affect the snapshot.
        env.stack.push(vec![0x01]);
        assert_eq!(env.p2sh_stack, initial);
    }

    #[test]
    fn test_epilogue_empty_stack_is_eval_false() {
        let mut env = env_for(Vec::new(), p2sh_template(&[0xcd; 20]));
        // Drain the template execution; HASH160 on the empty stack fails
        // first, so drive the epilogue directly instead.
        env.pc = env.end;
        env.stack.clear();
        assert_eq!(env.step(), Err(ScriptError::EvalFalse));
    }

    #[test]
    fn test_epilogue_falsy_top_is_eval_false() {
        let mut env = env_for(vec![vec![0x51]], p2sh_template(&[0xcd; 20]));
        env.pc = env.end;
        env.stack = vec![Vec::new()];
        assert_eq!(env.step(), Err(ScriptError::EvalFalse));
    }

    #[test]
    fn test_unbalanced_conditional_at_termination() {
        let mut env = env_for(Vec::new(), vec![OP_1, OP_IF]);
        assert_eq!(env.step(), Ok(StepOutcome::Continue)); // OP_1
        assert_eq!(env.step(), Ok(StepOutcome::Continue)); // OP_IF
        assert_eq!(env.step(), Err(ScriptError::UnbalancedConditional));
        assert!(env.is_done());
    }

    #[test]
    fn test_terminal_error_is_absorbing() {
        let mut env = env_for(Vec::new(), vec![OP_RETURN]);
        assert_eq!(env.step(), Err(ScriptError::OpReturn));
        let stack_after = env.stack().clone();
        assert_eq!(env.step(), Err(ScriptError::OpReturn));
        assert_eq!(env.stack(), &stack_after);
        assert_eq!(env.error(), Some(ScriptError::OpReturn));
    }

    #[test]
    fn test_terminal_success_is_absorbing() {
        let mut env = env_for(Vec::new(), vec![OP_1]);
        assert_eq!(run(&mut env), Ok(()));
        assert!(env.is_done());
        assert_eq!(env.step(), Ok(StepOutcome::Done));
        assert_eq!(env.step(), Ok(StepOutcome::Done));
    }

    #[test]
    fn test_run_simple_script() {
        let mut env = env_for(Vec::new(), vec![OP_1, OP_DUP, OP_EQUAL]);
        assert_eq!(run(&mut env), Ok(()));
        assert_eq!(env.stack(), &vec![vec![0x01]]);
        assert_eq!(env.op_count(), 2); // OP_DUP and OP_EQUAL; OP_1 is a push
    }
}
