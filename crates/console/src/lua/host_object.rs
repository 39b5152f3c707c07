//! Host objects exposed to Lua as read-only userdata.

use mlua::{Lua, MetaMethod, Result as LuaResult, UserData, UserDataMethods, Value};

use crate::host::{HostHandle, HostValue};

/// Userdata wrapper around a host object handle.
///
/// Attribute access goes through `__index`; assignment is refused.
pub(crate) struct HostObjectData(pub HostHandle);

impl UserData for HostObjectData {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            match this.0.attribute(&key) {
                Some(value) => host_value_to_lua(lua, value),
                None => Ok(Value::Nil),
            }
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (key, _value): (String, Value)| -> LuaResult<()> {
                Err(mlua::Error::RuntimeError(format!(
                    "attribute '{}' of {} is read-only",
                    key,
                    this.0.type_name()
                )))
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("<{}>", this.0.type_name()))
        });
    }
}

/// Convert a host value to a Lua value.
pub(crate) fn host_value_to_lua(lua: &Lua, value: HostValue) -> LuaResult<Value> {
    Ok(match value {
        HostValue::Nil => Value::Nil,
        HostValue::Bool(b) => Value::Boolean(b),
        HostValue::Integer(i) => Value::Integer(i),
        HostValue::Number(n) => Value::Number(n),
        HostValue::String(s) => Value::String(lua.create_string(&s)?),
        HostValue::Object(handle) => Value::UserData(lua.create_userdata(HostObjectData(handle))?),
    })
}

/// The host object behind a Lua value, if it is one.
pub(crate) fn as_host_object(value: &Value) -> Option<HostHandle> {
    match value {
        Value::UserData(ud) => ud
            .borrow::<HostObjectData>()
            .ok()
            .map(|data| data.0.clone()),
        _ => None,
    }
}
