use std::{cell::RefCell, fmt, rc::Rc};

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use replica_shared::{fields_id, Fields, RecordId, Request};

use crate::{
    context::{Callback, RequestContext},
    error::{ClientError, ValidationError},
    notifier::ChangeCause,
};

struct EntityInner {
    id: Option<RecordId>,
    /// Last server-confirmed value of every declared field
    shadow: RefCell<Fields>,
    context: Rc<RequestContext>,
}

/// One server-backed record.
///
/// Reads return the last server-confirmed value. Writes go to the server
/// first and only become visible once acknowledged, so there is never an
/// optimistic value to roll back. Cloning yields another handle to the same
/// entity.
#[derive(Clone)]
pub struct EntityProxy {
    inner: Rc<EntityInner>,
}

impl EntityProxy {
    pub(crate) fn new(fields: Fields, context: Rc<RequestContext>) -> Self {
        let id = fields_id(&fields, &context.id_field);
        Self {
            inner: Rc::new(EntityInner {
                id,
                shadow: RefCell::new(fields),
                context,
            }),
        }
    }

    /// Server-assigned identifier, fixed for the lifetime of the entity.
    pub fn id(&self) -> Option<&RecordId> {
        self.inner.id.as_ref()
    }

    /// Name of the owning collection.
    pub fn collection(&self) -> &str {
        &self.inner.context.collection
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.shadow.borrow().get(field).cloned()
    }

    /// Deserializes a single field. `Ok(None)` if the field is not declared.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, serde_json::Error> {
        self.get(field).map(serde_json::from_value).transpose()
    }

    /// Snapshot of every field, identifier included.
    pub fn fields(&self) -> Fields {
        self.inner.shadow.borrow().clone()
    }

    /// Deserializes the whole record into a typed struct.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields()))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.inner.shadow.borrow().keys().cloned().collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.inner.shadow.borrow().contains_key(field)
    }

    /// Whether both handles refer to the same entity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Writes one declared field through the server.
    ///
    /// Emits `updateOne` scoped to this entity. The new value becomes
    /// readable only after a successful ack; on a failed ack the field keeps
    /// its previous value and the error goes to `callback`. Observers are
    /// notified once the write settles either way.
    pub fn write<F>(&self, field: &str, value: Value, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Value, ClientError>) + 'static,
    {
        let id = self.require_id("write")?;
        if field == self.inner.context.id_field {
            return Err(ValidationError::IdNotWritable {
                field: field.to_string(),
            }
            .into());
        }
        if !self.has_field(field) {
            return Err(ValidationError::UnknownField {
                field: field.to_string(),
            }
            .into());
        }

        let mut fields = Fields::new();
        fields.insert(field.to_string(), value.clone());

        let entity = self.clone();
        let field = field.to_string();
        self.inner.context.emit(
            Request::UpdateOne {
                collection: self.collection().to_string(),
                id,
                fields,
            },
            move |result| {
                let cause = match &result {
                    Ok(_) => {
                        debug!("{}/{:?}: confirmed write of '{}'", entity.collection(), entity.id(), field);
                        entity.inner.shadow.borrow_mut().insert(field, value);
                        ChangeCause::EntityWritten
                    }
                    Err(_) => ChangeCause::Failed,
                };
                callback(result);
                entity.inner.context.notify(cause);
            },
        );
        Ok(())
    }

    /// Requests an entity-scoped update with an explicit field map.
    ///
    /// Shadow values are not touched here; the matching `updated` broadcast
    /// carries the confirmed values back through the owning collection.
    pub fn update<F>(&self, fields: Fields, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Value, ClientError>) + 'static,
    {
        let id = self.require_id("update")?;
        self.inner.context.emit_settled(
            Request::UpdateOne {
                collection: self.collection().to_string(),
                id,
                fields,
            },
            ChangeCause::EntityUpdated,
            Some(Box::new(callback) as Callback<Value>),
        );
        Ok(())
    }

    /// Requests deletion of this entity. The entity stays in its collection
    /// until the `deletedOne` broadcast is reconciled.
    pub fn delete<F>(&self, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Value, ClientError>) + 'static,
    {
        let id = self.require_id("delete")?;
        self.inner.context.emit_settled(
            Request::DeleteOne {
                collection: self.collection().to_string(),
                id,
            },
            ChangeCause::EntityDeleted,
            Some(Box::new(callback) as Callback<Value>),
        );
        Ok(())
    }

    /// Overwrites shadow values from a server-confirmed broadcast. The
    /// identifier is never overwritten.
    pub(crate) fn set(&self, fields: &Fields) {
        let id_field = &self.inner.context.id_field;
        let mut shadow = self.inner.shadow.borrow_mut();
        for (field, value) in fields {
            if field != id_field {
                shadow.insert(field.clone(), value.clone());
            }
        }
    }

    /// Replaces the whole record with an authoritative copy from the server,
    /// dropping fields it no longer carries.
    pub(crate) fn replace(&self, mut fields: Fields) {
        let id_field = &self.inner.context.id_field;
        let mut shadow = self.inner.shadow.borrow_mut();
        match shadow.get(id_field) {
            Some(id) => {
                fields.insert(id_field.clone(), id.clone());
            }
            None => {
                fields.remove(id_field);
            }
        }
        *shadow = fields;
    }

    fn require_id(&self, operation: &'static str) -> Result<RecordId, ValidationError> {
        self.inner
            .id
            .clone()
            .ok_or(ValidationError::EntityWithoutId { operation })
    }
}

impl fmt::Debug for EntityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("collection", &self.collection())
            .field("id", &self.inner.id)
            .field("fields", &*self.inner.shadow.borrow())
            .finish()
    }
}
