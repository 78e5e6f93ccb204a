//! crates/schoolhub_core/src/materials.rs
//!
//! Teaching materials shared with a course or a group.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::coursework::ensure_owner;
use crate::domain::{Actor, FileRef, Material};
use crate::ports::{Clock, PortError, PortResult, ScopeFilter};
use crate::store::BoundedStore;

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub description: String,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub file: Option<FileRef>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: Option<FileRef>,
    pub link: Option<String>,
}

#[derive(Clone)]
pub struct MaterialLibrary {
    store: BoundedStore,
    clock: Arc<dyn Clock>,
}

impl MaterialLibrary {
    pub fn new(store: BoundedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, teacher_id: Uuid, input: NewMaterial) -> PortResult<Material> {
        let now = self.clock.now();
        let material = Material {
            id: Uuid::new_v4(),
            course_id: input.course_id,
            group_id: input.group_id,
            teacher_id,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            file: input.file,
            link: input.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            created_at: now,
            updated_at: now,
        };
        validate(&material)?;

        let material = self
            .store
            .call("insert_material", |s| s.insert_material(material))
            .await?;
        info!(material_id = %material.id, %teacher_id, "Material published");
        Ok(material)
    }

    /// Materials in scope, newest first.
    pub async fn list(&self, scope: ScopeFilter) -> PortResult<Vec<Material>> {
        self.store
            .call("find_materials", |s| s.find_materials(scope))
            .await
    }

    pub async fn update(
        &self,
        actor: Actor,
        material_id: Uuid,
        patch: MaterialPatch,
    ) -> PortResult<Material> {
        let mut material = self.load(material_id).await?;
        ensure_owner(&actor, material.teacher_id, "material")?;

        if let Some(title) = patch.title {
            material.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            material.description = description.trim().to_string();
        }
        if patch.file.is_some() {
            material.file = patch.file;
        }
        if let Some(link) = patch.link {
            let link = link.trim().to_string();
            material.link = (!link.is_empty()).then_some(link);
        }
        validate(&material)?;
        material.updated_at = self.clock.now();

        self.store
            .call("update_material", |s| s.update_material(material))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Material {} not found", material_id)))
    }

    pub async fn delete(&self, actor: Actor, material_id: Uuid) -> PortResult<()> {
        let material = self.load(material_id).await?;
        ensure_owner(&actor, material.teacher_id, "material")?;
        if !self
            .store
            .call("delete_material", |s| s.delete_material(material_id))
            .await?
        {
            return Err(PortError::NotFound(format!("Material {} not found", material_id)));
        }
        info!(%material_id, actor = %actor.id, "Material deleted");
        Ok(())
    }

    async fn load(&self, material_id: Uuid) -> PortResult<Material> {
        self.store
            .call("get_material", |s| s.get_material(material_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Material {} not found", material_id)))
    }
}

fn validate(material: &Material) -> PortResult<()> {
    if material.title.is_empty() {
        return Err(PortError::InvalidInput("Material title is required".to_string()));
    }
    if material.file.is_none() && material.link.is_none() {
        return Err(PortError::InvalidInput(
            "A material needs a file or a link".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::Role;
    use crate::memory::InMemoryStore;
    use crate::testing::bounded;
    use chrono::{Duration, Utc};

    fn library() -> (Arc<FixedClock>, MaterialLibrary) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        (clock.clone(), MaterialLibrary::new(bounded(&store), clock))
    }

    fn slides(course_id: Uuid) -> NewMaterial {
        NewMaterial {
            title: "Slides".into(),
            description: "Week 1".into(),
            course_id: Some(course_id),
            group_id: None,
            file: None,
            link: Some("https://files.example/slides.pdf".into()),
        }
    }

    #[tokio::test]
    async fn listing_is_scoped_and_newest_first() {
        let (clock, library) = library();
        let teacher_id = Uuid::new_v4();
        let math = Uuid::new_v4();

        let older = library.create(teacher_id, slides(math)).await.unwrap();
        clock.advance(Duration::minutes(5));
        let newer = library.create(teacher_id, slides(math)).await.unwrap();
        library.create(teacher_id, slides(Uuid::new_v4())).await.unwrap();

        let listed = library.list(ScopeFilter::course(math)).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(library.list(ScopeFilter::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn creation_requires_title_and_content() {
        let (_, library) = library();
        let mut input = slides(Uuid::new_v4());
        input.link = Some("   ".into());
        assert!(matches!(
            library.create(Uuid::new_v4(), input).await,
            Err(PortError::InvalidInput(_))
        ));

        let mut input = slides(Uuid::new_v4());
        input.title = String::new();
        assert!(matches!(
            library.create(Uuid::new_v4(), input).await,
            Err(PortError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn only_the_owner_or_an_admin_may_change_a_material() {
        let (_, library) = library();
        let owner = Actor {
            id: Uuid::new_v4(),
            role: Role::Teacher,
        };
        let other = Actor {
            id: Uuid::new_v4(),
            role: Role::Teacher,
        };
        let material = library.create(owner.id, slides(Uuid::new_v4())).await.unwrap();

        let patch = MaterialPatch {
            title: Some("Updated slides".into()),
            ..Default::default()
        };
        assert!(matches!(
            library.update(other, material.id, patch.clone()).await,
            Err(PortError::Forbidden(_))
        ));
        let updated = library.update(owner, material.id, patch).await.unwrap();
        assert_eq!(updated.title, "Updated slides");

        assert!(matches!(
            library.delete(other, material.id).await,
            Err(PortError::Forbidden(_))
        ));
        let admin = Actor {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        library.delete(admin, material.id).await.unwrap();
        assert!(matches!(
            library.delete(owner, material.id).await,
            Err(PortError::NotFound(_))
        ));
    }
}
