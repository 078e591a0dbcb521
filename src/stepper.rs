//! Single-opcode interpreter
//!
//! One call consumes exactly one opcode or push-data unit at the cursor,
//! mutates the data stack / conditional stack / op-count, and advances the
//! cursor. The surrounding state machine lives in [`crate::env`].

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::checker::SignatureChecker;
use crate::constants::{MAX_OPS_PER_SCRIPT, MAX_SCRIPT_ELEMENT_SIZE, MAX_STACK_SIZE};
use crate::env::ExecutionEnv;
use crate::error::{Result, ScriptError};
use crate::opcodes::*;
use crate::script::{decode_num, encode_num, is_minimal_push, parse_instruction};
use crate::types::ByteString;

fn item_true() -> ByteString {
    vec![1]
}

fn item_false() -> ByteString {
    Vec::new()
}

fn hash160(data: &[u8]) -> ByteString {
    Ripemd160::digest(Sha256::digest(data)).to_vec()
}

fn hash256(data: &[u8]) -> ByteString {
    Sha256::digest(Sha256::digest(data)).to_vec()
}

/// Execute the single instruction at the cursor of `env`'s working script.
pub(crate) fn exec_step<C: SignatureChecker>(env: &mut ExecutionEnv<C>) -> Result<()> {
    let (opcode, push_data, next_pc) = parse_instruction(env.working_script(), env.pc)?;
    env.pc = next_pc;

    // A branch is active only when every enclosing conditional took it.
    let executing = env.cond_stack.iter().all(|&active| active);

    if let Some(data) = push_data {
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ScriptError::PushSize);
        }
        if env.require_minimal && !is_minimal_push(opcode, &data) {
            return Err(ScriptError::MinimalData);
        }
        if executing {
            env.stack.push(data);
        }
        return check_stack_limit(env);
    }

    if opcode > OP_16 {
        env.op_count += 1;
        if env.op_count > MAX_OPS_PER_SCRIPT {
            return Err(ScriptError::OpCount);
        }
    }

    // Disabled opcodes fail the script even inside an unexecuted branch.
    if is_disabled(opcode) {
        return Err(ScriptError::DisabledOpcode);
    }

    if !executing && !matches!(opcode, OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF) {
        return Ok(());
    }

    match opcode {
        OP_0 => env.stack.push(item_false()),
        OP_1NEGATE => env.stack.push(encode_num(-1)),
        OP_1..=OP_16 => {
            let n = (opcode - OP_1 + 1) as i64;
            env.stack.push(encode_num(n));
        }

        OP_NOP => {}

        OP_IF | OP_NOTIF => {
            let mut value = false;
            if executing {
                let condition = env
                    .stack
                    .pop()
                    .ok_or(ScriptError::UnbalancedConditional)?;
                value = crate::script::cast_to_bool(&condition);
                if opcode == OP_NOTIF {
                    value = !value;
                }
            }
            env.cond_stack.push(value);
        }
        OP_ELSE => {
            let top = env
                .cond_stack
                .last_mut()
                .ok_or(ScriptError::UnbalancedConditional)?;
            *top = !*top;
        }
        OP_ENDIF => {
            env.cond_stack
                .pop()
                .ok_or(ScriptError::UnbalancedConditional)?;
        }

        OP_VERIFY => {
            let value = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            if !crate::script::cast_to_bool(&value) {
                return Err(ScriptError::Verify);
            }
        }
        OP_RETURN => return Err(ScriptError::OpReturn),

        OP_TOALTSTACK => {
            let value = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            env.altstack.push(value);
        }
        OP_FROMALTSTACK => {
            let value = env
                .altstack
                .pop()
                .ok_or(ScriptError::InvalidAltstackOperation)?;
            env.stack.push(value);
        }

        OP_2DROP => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            env.stack.pop();
            env.stack.pop();
        }
        OP_2DUP => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let a = env.stack[env.stack.len() - 2].clone();
            let b = env.stack[env.stack.len() - 1].clone();
            env.stack.push(a);
            env.stack.push(b);
        }
        OP_3DUP => {
            if env.stack.len() < 3 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let a = env.stack[env.stack.len() - 3].clone();
            let b = env.stack[env.stack.len() - 2].clone();
            let c = env.stack[env.stack.len() - 1].clone();
            env.stack.push(a);
            env.stack.push(b);
            env.stack.push(c);
        }
        OP_2OVER => {
            if env.stack.len() < 4 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let a = env.stack[env.stack.len() - 4].clone();
            let b = env.stack[env.stack.len() - 3].clone();
            env.stack.push(a);
            env.stack.push(b);
        }
        OP_2ROT => {
            if env.stack.len() < 6 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let a = env.stack.remove(env.stack.len() - 6);
            let b = env.stack.remove(env.stack.len() - 5);
            env.stack.push(a);
            env.stack.push(b);
        }
        OP_2SWAP => {
            if env.stack.len() < 4 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let len = env.stack.len();
            env.stack.swap(len - 4, len - 2);
            env.stack.swap(len - 3, len - 1);
        }

        OP_IFDUP => {
            let value = env
                .stack
                .last()
                .ok_or(ScriptError::InvalidStackOperation)?
                .clone();
            if crate::script::cast_to_bool(&value) {
                env.stack.push(value);
            }
        }
        OP_DEPTH => {
            let depth = encode_num(env.stack.len() as i64);
            env.stack.push(depth);
        }
        OP_DROP => {
            env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
        }
        OP_DUP => {
            let value = env
                .stack
                .last()
                .ok_or(ScriptError::InvalidStackOperation)?
                .clone();
            env.stack.push(value);
        }
        OP_NIP => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let index = env.stack.len() - 2;
            env.stack.remove(index);
        }
        OP_OVER => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let value = env.stack[env.stack.len() - 2].clone();
            env.stack.push(value);
        }
        OP_PICK | OP_ROLL => {
            let count = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            let n = decode_num(&count, env.require_minimal)?;
            if n < 0 || n as usize >= env.stack.len() {
                return Err(ScriptError::InvalidStackOperation);
            }
            let index = env.stack.len() - 1 - n as usize;
            let value = if opcode == OP_ROLL {
                env.stack.remove(index)
            } else {
                env.stack[index].clone()
            };
            env.stack.push(value);
        }
        OP_ROT => {
            if env.stack.len() < 3 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let value = env.stack.remove(env.stack.len() - 3);
            env.stack.push(value);
        }
        OP_SWAP => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let len = env.stack.len();
            env.stack.swap(len - 2, len - 1);
        }
        OP_TUCK => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let value = env.stack[env.stack.len() - 1].clone();
            let index = env.stack.len() - 2;
            env.stack.insert(index, value);
        }
        OP_SIZE => {
            let size = env
                .stack
                .last()
                .ok_or(ScriptError::InvalidStackOperation)?
                .len();
            env.stack.push(encode_num(size as i64));
        }

        OP_EQUAL | OP_EQUALVERIFY => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let a = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            let b = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            let equal = a == b;
            if opcode == OP_EQUALVERIFY {
                if !equal {
                    return Err(ScriptError::EqualVerify);
                }
            } else {
                env.stack
                    .push(if equal { item_true() } else { item_false() });
            }
        }

        OP_RIPEMD160 => {
            let data = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            env.stack.push(Ripemd160::digest(&data).to_vec());
        }
        OP_SHA256 => {
            let data = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            env.stack.push(Sha256::digest(&data).to_vec());
        }
        OP_HASH160 => {
            let data = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            env.stack.push(hash160(&data));
        }
        OP_HASH256 => {
            let data = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            env.stack.push(hash256(&data));
        }

        OP_CHECKSIG | OP_CHECKSIGVERIFY => {
            if env.stack.len() < 2 {
                return Err(ScriptError::InvalidStackOperation);
            }
            let pubkey = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            let signature = env.stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
            let valid = env
                .checker
                .check_ecdsa_signature(&signature, &pubkey, env.sig_version);
            if opcode == OP_CHECKSIGVERIFY {
                if !valid {
                    return Err(ScriptError::CheckSigVerify);
                }
            } else {
                env.stack
                    .push(if valid { item_true() } else { item_false() });
            }
        }

        _ => return Err(ScriptError::BadOpcode),
    }

    check_stack_limit(env)
}

fn check_stack_limit<C: SignatureChecker>(env: &ExecutionEnv<C>) -> Result<()> {
    if env.stack.len() + env.altstack.len() > MAX_STACK_SIZE {
        return Err(ScriptError::StackSize);
    }
    Ok(())
}
