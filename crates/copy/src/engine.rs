//! The recursive value copier (§4.1 "Inter-copy engine").

use crate::context::{CopyContext, Direction};
use crate::convert::{apply_convert, has_converter, ConvertHint};
use crate::sentinel::{as_sentinel, make_sentinel, SentinelKind};
use lanes_core::error::TransferError;
use lanes_core::ids::NIL_SENTINEL;
use lanes_value::{Function, LightUserdata, Table, UserData, Value};
use std::sync::Arc;

fn nil_sentinel_value() -> Value {
    Value::Light(LightUserdata(NIL_SENTINEL.token()))
}

fn is_nil_sentinel(value: &Value) -> bool {
    matches!(value, Value::Light(LightUserdata(token)) if *token == NIL_SENTINEL.token())
}

fn sentinel_kind_for(ctx: &CopyContext, value: &Value) -> SentinelKind {
    match value {
        Value::Function(_) => SentinelKind::Function,
        Value::Table(_) => SentinelKind::Table,
        Value::UserData(u) => match u.metatable.read().clone() {
            Some(mt) if ctx.clonables.hook_for(&mt).is_some() => SentinelKind::UserDataClone,
            _ => SentinelKind::UserDataLookup,
        },
        _ => SentinelKind::Table,
    }
}

/// Reverse-resolve a lookup sentinel (§4.1 "Keeper-direction asymmetries").
/// A `UserDataClone` sentinel is resolved to the destination's registered
/// template and then run back through its clone hook, so every lane that
/// receives it gets an independent instance rather than the same shared
/// `Arc`; every other kind resolves straight to the registered value.
fn resolve_sentinel(ctx: &CopyContext, kind: SentinelKind, name: &str) -> Result<Value, TransferError> {
    let resolved = ctx
        .dest_lookup
        .resolve_by_name(name)
        .ok_or_else(|| TransferError::lookup_failed(name.to_string()))?;

    if kind != SentinelKind::UserDataClone {
        return Ok(resolved);
    }

    let Value::UserData(template) = &resolved else {
        return Ok(resolved);
    };
    let Some(mt) = template.metatable.read().clone() else {
        return Ok(resolved);
    };
    let Some(hook) = ctx.clonables.hook_for(&mt) else {
        return Ok(resolved);
    };

    let (bytes, uservalues) = hook(template);
    Ok(Value::UserData(Arc::new(UserData {
        bytes: parking_lot::RwLock::new(bytes),
        uservalues: parking_lot::RwLock::new(uservalues),
        metatable: parking_lot::RwLock::new(Some(mt)),
        registered_name: template.registered_name.clone(),
    })))
}

/// Copy `value` from the source state to the destination state described
/// by `ctx`.
pub fn copy_value(ctx: &CopyContext, value: &Value) -> Result<Value, TransferError> {
    // Reverse-resolve a lookup sentinel before anything else.
    if ctx.direction == Direction::FromKeeper {
        if let Some((kind, name)) = as_sentinel(value) {
            return resolve_sentinel(ctx, kind, &name);
        }
        if is_nil_sentinel(value) {
            return Ok(Value::Nil);
        }
    }

    if value.is_nil() {
        return Ok(if ctx.direction == Direction::ToKeeper {
            nil_sentinel_value()
        } else {
            Value::Nil
        });
    }

    // §4.1 step 1 for tables, generalized to any reference-identity value:
    // a name registered in the source's lookup database is resolved in the
    // destination's, rather than copied structurally.
    if let Some(name) = ctx.source_lookup.name_of(value) {
        if ctx.direction == Direction::ToKeeper {
            return Ok(make_sentinel(sentinel_kind_for(ctx, value), name));
        }
        match ctx.dest_lookup.resolve_by_name(&name) {
            Some(resolved) => return Ok(resolved),
            None if ctx.direction == Direction::FromKeeper => {
                return Err(TransferError::lookup_failed(name.to_string()));
            }
            None => { /* lane-body direction falls back to structural cloning */ }
        }
    }

    match value {
        Value::Nil => unreachable!("nil handled above"),
        Value::Boolean(_)
        | Value::Integer(_)
        | Value::Number(_)
        | Value::Str(_)
        | Value::Light(_)
        | Value::Deep(_) => Ok(value.clone()),
        Value::Table(t) => copy_table(ctx, t),
        Value::Function(f) => copy_function(ctx, f),
        Value::UserData(u) => copy_userdata(ctx, u),
    }
}

fn copy_metatable(ctx: &CopyContext, source: &Arc<Table>) -> Result<Arc<Table>, TransferError> {
    if let Some(cached) = ctx.metatables.lookup(source) {
        return Ok(cached);
    }
    let copied = copy_value(ctx, &Value::Table(source.clone()))?;
    let Value::Table(copied_table) = copied else {
        unreachable!("copy_table always returns Value::Table")
    };
    ctx.metatables.intern(source, copied_table.clone());
    Ok(copied_table)
}

fn copy_table(ctx: &CopyContext, source: &Arc<Table>) -> Result<Value, TransferError> {
    let id = source.identity();
    if let Some(cached) = ctx.cache_get(id) {
        return Ok(cached);
    }

    let dest = Table::new();
    ctx.cache_insert(id, Value::Table(dest.clone()));

    for (key, val) in source.entries() {
        // "keys are copied in a key context that rejects uncopyable keys silently"
        let copied_key = match copy_value(ctx, &key) {
            Ok(k) => k,
            Err(_) => continue,
        };
        let copied_val = copy_value(ctx, &val)?;
        dest.insert(copied_key, copied_val);
    }

    if let Some(mt) = source.metatable() {
        let dest_mt = copy_metatable(ctx, &mt)?;
        dest.set_metatable(Some(dest_mt));
    }

    Ok(Value::Table(dest))
}

fn copy_function(ctx: &CopyContext, source: &Arc<Function>) -> Result<Value, TransferError> {
    match source.as_ref() {
        Function::Native { name } => ctx
            .dest_lookup
            .resolve_by_name(name)
            .ok_or_else(|| TransferError::lookup_failed(name.to_string())),
        Function::Bytecode {
            code,
            upvalues,
            global_env_upvalue,
        } => {
            let id = source.identity();
            if let Some(cached) = ctx.cache_get(id) {
                return Ok(cached);
            }

            let dest_fn = Arc::new(Function::Bytecode {
                code: code.clone(),
                upvalues: parking_lot::RwLock::new(Vec::new()),
                global_env_upvalue: *global_env_upvalue,
            });
            let dest_value = Value::Function(dest_fn.clone());
            ctx.cache_insert(id, dest_value.clone());

            let source_upvalues = upvalues.read().clone();
            let mut copied = Vec::with_capacity(source_upvalues.len());
            for (i, uv) in source_upvalues.iter().enumerate() {
                if Some(i) == *global_env_upvalue {
                    copied.push(ctx.dest_global_env.clone().unwrap_or(Value::Nil));
                } else {
                    copied.push(copy_value(ctx, uv)?);
                }
            }

            let Function::Bytecode {
                upvalues: dest_upvalues,
                ..
            } = dest_fn.as_ref()
            else {
                unreachable!()
            };
            *dest_upvalues.write() = copied;

            Ok(dest_value)
        }
    }
}

fn copy_userdata(ctx: &CopyContext, source: &Arc<UserData>) -> Result<Value, TransferError> {
    let id = source.identity();
    if let Some(cached) = ctx.cache_get(id) {
        return Ok(cached);
    }

    // 1. Clonable: the metatable declares a `__lanesclone`-equivalent hook.
    if let Some(mt) = source.metatable.read().clone() {
        if let Some(hook) = ctx.clonables.hook_for(&mt) {
            let (bytes, source_uvs) = hook(source);
            let dest_mt = copy_metatable(ctx, &mt)?;
            let mut copied_uvs = Vec::with_capacity(source_uvs.len());
            for uv in &source_uvs {
                copied_uvs.push(copy_value(ctx, uv)?);
            }
            let dest = Arc::new(UserData {
                bytes: parking_lot::RwLock::new(bytes),
                uservalues: parking_lot::RwLock::new(copied_uvs),
                metatable: parking_lot::RwLock::new(Some(dest_mt)),
                registered_name: source.registered_name.clone(),
            });
            let value = Value::UserData(dest);
            ctx.cache_insert(id, value.clone());
            return Ok(value);
        }
    }

    // 2. Deep objects are not representable as `Value::UserData` in this
    // port (see `Value::Deep`); that case is handled earlier in
    // `copy_value` and never reaches this function.

    // 3. Convert fallback.
    let source_value = Value::UserData(source.clone());
    if has_converter(&source_value, ctx.convert_registry, ctx.convert_fallback) {
        let hint = match ctx.direction {
            Direction::ToKeeper | Direction::FromKeeper => ConvertHint::Keeper,
            Direction::LaneToLane => ConvertHint::Regular,
        };
        let mut current = source_value.clone();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            if attempts > ctx.convert_max_attempts {
                tracing::warn!(attempts, "convert-fallback did not converge on a transferable value");
                return Err(TransferError::ConversionLoop { attempts });
            }
            current = apply_convert(&current, hint, ctx.convert_registry, ctx.convert_fallback)?;
            if !matches!(current, Value::UserData(_)) {
                let result = copy_value(ctx, &current)?;
                ctx.cache_insert(id, result.clone());
                return Ok(result);
            }
        }
    }

    // 4. Lookup.
    if let Some(name) = source.registered_name.clone() {
        return ctx
            .dest_lookup
            .resolve_by_name(&name)
            .ok_or_else(|| TransferError::lookup_failed(name.to_string()));
    }

    tracing::debug!("userdata has no clone hook, no converter, and no registered name");
    Err(TransferError::not_transferable("userdata"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clonable::ClonableRegistry;
    use crate::convert::{ConvertFallback, ConvertRegistry};
    use crate::metatable::MetatableRegistry;
    use lanes_value::LookupDatabase;
    use num_bigint::BigInt;

    fn test_context<'a>(
        direction: Direction,
        source_lookup: &'a LookupDatabase,
        dest_lookup: &'a LookupDatabase,
        metatables: &'a MetatableRegistry,
        clonables: &'a ClonableRegistry,
        convert_registry: &'a ConvertRegistry,
        convert_fallback: &'a ConvertFallback,
    ) -> CopyContext<'a> {
        CopyContext::new(
            direction,
            source_lookup,
            dest_lookup,
            None,
            metatables,
            clonables,
            convert_registry,
            convert_fallback,
            1,
            false,
        )
    }

    #[test]
    fn primitives_copy_by_value() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;
        let ctx = test_context(
            Direction::LaneToLane,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );

        assert_eq!(
            copy_value(&ctx, &Value::Integer(BigInt::from(42))).unwrap(),
            Value::Integer(BigInt::from(42))
        );
        assert_eq!(
            copy_value(&ctx, &Value::Str("hello".into())).unwrap(),
            Value::Str("hello".into())
        );
    }

    #[test]
    fn cyclic_table_terminates_and_preserves_identity() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;
        let ctx = test_context(
            Direction::LaneToLane,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );

        let t = Table::new();
        t.insert(Value::Str("self".into()), Value::Table(t.clone()));

        let copied = copy_value(&ctx, &Value::Table(t)).unwrap();
        let Value::Table(copied_table) = copied.clone() else {
            panic!("expected table");
        };
        let looped = copied_table.get(&Value::Str("self".into())).unwrap();
        assert_eq!(looped, copied, "cyclic reference should point at the same copy");
    }

    #[test]
    fn shared_references_stay_shared_in_one_copy() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;
        let ctx = test_context(
            Direction::LaneToLane,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );

        let shared = Table::new();
        let outer = Table::new();
        outer.insert(Value::Str("a".into()), Value::Table(shared.clone()));
        outer.insert(Value::Str("b".into()), Value::Table(shared.clone()));

        let copied = copy_value(&ctx, &Value::Table(outer)).unwrap();
        let Value::Table(copied_outer) = copied else {
            panic!("expected table");
        };
        let a = copied_outer.get(&Value::Str("a".into())).unwrap();
        let b = copied_outer.get(&Value::Str("b".into())).unwrap();
        assert_eq!(a, b, "two references to the same table must stay the same reference");
    }

    #[test]
    fn registered_name_resolves_via_lookup() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;
        let ctx = test_context(
            Direction::LaneToLane,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );

        let io_table_src = Value::Table(Table::new());
        let io_table_dst = Value::Table(Table::new());
        src_lookup.register("io", io_table_src.clone());
        dst_lookup.register("io", io_table_dst.clone());

        let copied = copy_value(&ctx, &io_table_src).unwrap();
        assert_eq!(copied, io_table_dst);
    }

    #[test]
    fn unregistered_lookup_in_lane_direction_falls_back_to_clone() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;
        let ctx = test_context(
            Direction::LaneToLane,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );

        let io_table_src = Value::Table(Table::new());
        src_lookup.register("io", io_table_src.clone());
        // destination has NOT preloaded "io": falls back to a structural clone.
        let copied = copy_value(&ctx, &io_table_src).unwrap();
        assert_ne!(copied, io_table_src);
        assert!(matches!(copied, Value::Table(_)));
    }

    #[test]
    fn unregistered_lookup_into_keeper_roundtrips_through_sentinel() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;

        let io_table_src = Value::Table(Table::new());
        src_lookup.register("io", io_table_src.clone());

        let into_keeper = test_context(
            Direction::ToKeeper,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );
        let in_keeper = copy_value(&into_keeper, &io_table_src).unwrap();
        assert!(as_sentinel(&in_keeper).is_some());

        // Now reverse it out of the keeper into a state that HAS registered "io".
        let keeper_lookup = LookupDatabase::new();
        let consumer_lookup = LookupDatabase::new();
        let io_table_dst = Value::Table(Table::new());
        consumer_lookup.register("io", io_table_dst.clone());
        let out_of_keeper = test_context(
            Direction::FromKeeper,
            &keeper_lookup,
            &consumer_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );
        let resolved = copy_value(&out_of_keeper, &in_keeper).unwrap();
        assert_eq!(resolved, io_table_dst);
    }

    #[test]
    fn registered_clonable_userdata_resolves_to_a_distinct_instance() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;

        let mt = Table::new();
        clonables.register(
            &mt,
            Arc::new(|ud: &UserData| (ud.bytes.read().clone(), ud.uservalues.read().clone())),
        );
        let template = Value::UserData(Arc::new(UserData {
            bytes: parking_lot::RwLock::new(vec![1, 2, 3]),
            uservalues: parking_lot::RwLock::new(Vec::new()),
            metatable: parking_lot::RwLock::new(Some(mt)),
            registered_name: Some(Arc::from("widgets.counter")),
        }));
        src_lookup.register("widgets.counter", template.clone());
        dst_lookup.register("widgets.counter", template.clone());

        let into_keeper = test_context(
            Direction::ToKeeper,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );
        let in_keeper = copy_value(&into_keeper, &template).unwrap();
        let (kind, _) = as_sentinel(&in_keeper).expect("should be a sentinel");
        assert_eq!(kind, SentinelKind::UserDataClone);

        let out_of_keeper = test_context(
            Direction::FromKeeper,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );
        let resolved = copy_value(&out_of_keeper, &in_keeper).unwrap();
        assert_ne!(resolved, template, "clone strategy must not return the same shared instance");
        let Value::UserData(resolved_ud) = resolved else {
            panic!("expected userdata");
        };
        assert_eq!(*resolved_ud.bytes.read(), vec![1, 2, 3]);
    }

    #[test]
    fn nil_becomes_sentinel_inside_a_keeper_and_back() {
        let src_lookup = LookupDatabase::new();
        let dst_lookup = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::DoNothing;

        let into_keeper = test_context(
            Direction::ToKeeper,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );
        let stored = copy_value(&into_keeper, &Value::Nil).unwrap();
        assert_ne!(stored, Value::Nil);

        let out_of_keeper = test_context(
            Direction::FromKeeper,
            &src_lookup,
            &dst_lookup,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
        );
        assert_eq!(copy_value(&out_of_keeper, &stored).unwrap(), Value::Nil);
    }
}
